//! Store and cache backends
//!
//! - `memory` - In-memory [`LedgerStore`](crate::core::LedgerStore) with row locks
//! - `cache` - In-memory [`ViewCache`](crate::core::ViewCache) with expiry
//! - `postgres` - PostgreSQL store (`postgres` feature)
//! - `redis_cache` - Redis cache (`redis` feature)
//! - `backends` - Picks the store and cache named by the configuration

pub mod backends;
pub mod cache;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis_cache;

pub use backends::Backends;
pub use cache::InMemoryCache;
pub use memory::InMemoryLedgerStore;
#[cfg(feature = "postgres")]
pub use postgres::PgLedgerStore;
#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;
