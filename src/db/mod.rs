pub mod cache;
pub mod postgres;
pub mod redis;

pub use cache::{CacheEntry, CacheStatsSnapshot, TieredCache, TtlClass, TtlPolicy};
pub use postgres::create_pool;
pub use redis::create_redis_client;
pub use redis::SharedTier;
