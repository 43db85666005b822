use crosspoint_core::QueryKey;
use serde::Serialize;

use crate::error::ErrorInfo;

/// Lifecycle of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// Known to the cache but never fetched.
    Idle,
    /// First fetch in flight, nothing settled yet.
    Loading,
    Success,
    Error,
}

impl QueryStatus {
    /// Success or Error.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Point-in-time view of one cache slot.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub key: QueryKey,
    pub status: QueryStatus,
    /// Last successfully fetched value. Survives later failures.
    pub value: Option<T>,
    /// Error from the most recent settled fetch, if it failed.
    pub error: Option<ErrorInfo>,
    /// When `value` was fetched, in clock milliseconds.
    pub fetched_at: Option<u64>,
    /// A fetch is in flight (first load or background refresh).
    pub is_fetching: bool,
    /// The entry will be refetched on next use.
    pub is_stale: bool,
}

impl<T> CacheEntry<T> {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}
