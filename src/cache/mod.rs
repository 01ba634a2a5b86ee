//! Task cache
//!
//! Cache-aside storage for serialized tasks plus a separate, non-expiring index of
//! task ids that are believed to be listable.
//!
//! - **Entries** expire individually after the configured TTL.
//! - **Index** never expires; stale members are healed by the list query.
//!
//! Backends implement [`TaskCache`]. Callers go through [`CacheHandle`], which turns
//! backend failures into logged no-ops so reads can fall back to the read store.

mod config;
mod handle;
mod keys;
mod lock;
mod memory;
mod store;

pub use config::CacheConfig;
pub use handle::CacheHandle;
pub use keys::CacheKeys;
pub use memory::MemoryTaskCache;
pub use store::{BulkGet, CacheError, TaskCache};
