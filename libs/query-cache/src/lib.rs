//! Process-wide query cache for server data.
//!
//! Maps query keys to the latest known result of a fetch, its
//! staleness state and in-flight status. Concurrent identical requests
//! deduplicate onto one network call, cancelled or superseded fetches
//! never write cache state, and invalidation marks whole key families
//! stale with or without a background refetch.

pub mod binding;
pub mod config;
pub mod entry;
pub mod key;
mod macros;
pub mod observer;
pub mod store;

pub use binding::QueryBinding;
pub use config::{CacheConfig, QueryOptions};
pub use entry::{EntrySnapshot, QueryState, QueryStatus};
pub use key::{KeySegment, QueryKey};
pub use observer::{QueryFetcher, QueryObserver};
pub use store::{InvalidateMode, QueryCache};
