//! In-process caching for query results.
//!
//! The dashboard polls the same handful of queries in tight loops, so every
//! service memoizes its (filters × sort × page) results for a short TTL:
//! - `MemoryStore` holds TTL-stamped JSON values and is swept periodically
//! - `CacheLayer` adds cache-aside semantics around an async compute
//! - `QueryKey` derives stable, order-independent keys from query params

mod key;
mod layer;
mod store;

pub use key::QueryKey;
pub use layer::CacheLayer;
pub use store::{spawn_sweeper, MemoryStore};
