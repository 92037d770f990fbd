pub mod daily;
pub mod store;

pub use daily::{CacheEntry, DailyResultCache};
pub use store::{CacheMap, CacheStore, InMemoryStore, JsonFileStore};
