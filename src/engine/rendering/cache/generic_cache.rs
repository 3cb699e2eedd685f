use super::H;
use crate::engine::rendering::backend::GraphicsApi;
use log::{trace, warn};
use slotmap::SlotMap;
use slotmap::DefaultKey;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// A value that can live in a [`ResourceCache`].
pub trait CacheType: Sized {
    fn name() -> &'static str;

    /// Frees whatever driver objects the value owns.
    fn release(self, api: &mut dyn GraphicsApi);
}

struct Entry<K, V> {
    key: K,
    value: V,
}

/// Content-keyed arena holding at most one value per key.
///
/// The cache owns its values; callers keep [`H`] handles that are checked
/// against the slot generation on every [`ResourceCache::resolve`]. Entries
/// live until they are removed or the cache is cleared.
pub struct ResourceCache<K, V: CacheType> {
    entries: SlotMap<DefaultKey, Entry<K, V>>,
    index: HashMap<K, H<V>>,
}

impl<K, V: CacheType> Default for ResourceCache<K, V> {
    fn default() -> Self {
        Self {
            entries: SlotMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone + Debug, V: CacheType> ResourceCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.index.contains_key(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<H<V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.index.get(key).copied()
    }

    /// Returns the handle stored under `key`, calling `create` to build and
    /// insert the value only when there is none yet.
    pub fn load_with<E>(&mut self, key: K, create: impl FnOnce(&K) -> Result<V, E>) -> Result<H<V>, E> {
        if let Some(handle) = self.index.get(&key) {
            trace!("[{} Cache] Hit: {key:?} -> {handle}", V::name());
            return Ok(*handle);
        }

        let value = create(&key)?;
        let handle = H::new(self.entries.insert(Entry {
            key: key.clone(),
            value,
        }));
        self.index.insert(key, handle);

        trace!(
            "[{} Cache] Added element: {:?} as {handle}",
            V::name(),
            self.entries[handle.key()].key
        );

        Ok(handle)
    }

    pub fn resolve(&self, handle: H<V>) -> Option<&V> {
        match self.entries.get(handle.key()) {
            Some(entry) => Some(&entry.value),
            None => {
                warn!("[{} Cache] Invalid Reference: h={handle} not found", V::name());
                None
            }
        }
    }

    pub fn contains(&self, handle: H<V>) -> bool {
        self.entries.contains_key(handle.key())
    }

    pub fn key_of(&self, handle: H<V>) -> Option<&K> {
        self.entries.get(handle.key()).map(|entry| &entry.key)
    }

    /// Evicts the entry for `key` and hands its value back. Handles to it
    /// stop resolving.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let handle = self.index.remove(key)?;
        let entry = self.entries.remove(handle.key())?;
        trace!("[{} Cache] Removed element: {:?}", V::name(), entry.key);
        Some(entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (H<V>, &K, &V)> {
        self.entries
            .iter()
            .map(|(key, entry)| (H::new(key), &entry.key, &entry.value))
    }

    /// Empties the cache, handing every value to `f`.
    pub fn drain_into(&mut self, mut f: impl FnMut(K, V)) {
        self.index.clear();
        for (_, entry) in self.entries.drain() {
            f(entry.key, entry.value);
        }
    }

    /// Empties the cache and releases every value's driver objects.
    pub fn clear(&mut self, api: &mut dyn GraphicsApi) {
        let count = self.len();
        self.drain_into(|_, value| value.release(api));
        if count > 0 {
            trace!("[{} Cache] Released {count} elements", V::name());
        }
    }
}
