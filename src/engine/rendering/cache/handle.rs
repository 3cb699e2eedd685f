use slotmap::{DefaultKey, Key, KeyData};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Generation-checked handle to an entry of a [`ResourceCache`](super::ResourceCache).
///
/// Handles are plain copyable values; they never keep the entry alive. A
/// handle to a removed entry stays invalid even if its slot is reused.
pub struct H<T> {
    key: DefaultKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> H<T> {
    pub(super) fn new(key: DefaultKey) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    pub(super) fn key(&self) -> DefaultKey {
        self.key
    }

    fn data(&self) -> KeyData {
        self.key.data()
    }

    /// Stable integer form, usable as an opaque id outside the cache.
    pub fn as_ffi(&self) -> u64 {
        self.data().as_ffi()
    }
}

impl<T> Clone for H<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for H<T> {}

impl<T> PartialEq for H<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for H<T> {}

impl<T> PartialOrd for H<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for H<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl<T> Hash for H<T> {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.key.hash(state);
    }
}

impl<T> Debug for H<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "H({:?})", self.data())
    }
}

impl<T> Display for H<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:?}", self.data())
    }
}
