pub mod entry;
pub mod response_cache;

pub use entry::CacheEntry;
pub use response_cache::ResponseCache;
