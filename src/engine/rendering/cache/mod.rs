mod generic_cache;
mod handle;

mod asset_cache;

pub use self::asset_cache::*;
pub use self::generic_cache::{CacheType, ResourceCache};
pub use self::handle::H;
