//! Request cache: one shared entry per [`QueryKey`](crosspoint_core::QueryKey).
//!
//! The cache deduplicates concurrent fetches of the same descriptor, serves
//! fresh entries without touching the network, keeps the last good value
//! visible through refreshes and failures, and evicts entries nobody has
//! looked at for a while.
//!
//! ```text
//!   get(D) ──► slot exists & fresh? ──yes──► snapshot
//!                    │ no
//!                    ▼
//!             fetch in flight? ──yes──► snapshot (is_fetching)
//!                    │ no
//!                    ▼
//!             spawn fetch (generation g) ──► commit iff g still current
//! ```

mod entry;
mod fetcher;
mod gc;
mod store;

pub use entry::{CacheEntry, QueryStatus};
pub use fetcher::{shared, Fetcher, SharedFetcher};
pub use gc::{CacheGcWorker, GcTask, Sweep};
pub use store::{RequestCache, Subscription};

/// One minute in milliseconds.
pub const MINUTE_MS: u64 = 60_000;

/// Freshness and retention policy for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// A cached value is stale once its age exceeds this many milliseconds;
    /// an entry exactly `stale_ms` old is still fresh.
    pub stale_ms: u64,
    /// Idle time in milliseconds after which an unobserved entry is evicted.
    pub gc_ms: u64,
}

impl QueryOptions {
    #[must_use]
    pub const fn new(stale_ms: u64, gc_ms: u64) -> Self {
        Self { stale_ms, gc_ms }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_ms: 0,
            gc_ms: 5 * MINUTE_MS,
        }
    }
}
