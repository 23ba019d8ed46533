use std::time::{Duration, Instant};

use bytes::Bytes;
use common_errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// One slot of the store. Values are kept serialized so the store
/// itself stays untyped; decoding happens at the typed surface.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub data: Option<Bytes>,
    pub status: QueryStatus,
    pub error: Option<ApiError>,
    /// When the data was last confirmed by the network. Direct writes
    /// (optimistic updates, rollback) leave this untouched.
    pub updated_at: Option<Instant>,
    pub stale_after: Duration,
    pub invalidated: bool,
}

impl CacheEntry {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
            error: None,
            updated_at: None,
            stale_after,
            invalidated: false,
        }
    }

    pub fn is_stale(&self) -> bool {
        if self.invalidated {
            return true;
        }
        match self.updated_at {
            Some(at) => at.elapsed() >= self.stale_after,
            None => true,
        }
    }

    pub fn is_fresh_success(&self) -> bool {
        self.status == QueryStatus::Success
            && self.data.is_some()
            && !self.is_stale()
    }

    /// Status to fall back to when a pending fetch is abandoned.
    pub fn settled_status(&self) -> QueryStatus {
        if self.data.is_some() {
            QueryStatus::Success
        }
        else if self.error.is_some() {
            QueryStatus::Error
        }
        else {
            QueryStatus::Idle
        }
    }
}

/// Read-only view of a cache entry as returned by
/// [`QueryCache::read_key`](crate::QueryCache::read_key).
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub status: QueryStatus,
    pub data: Option<Bytes>,
    pub error: Option<ApiError>,
    pub is_stale: bool,
}

impl From<&CacheEntry> for EntrySnapshot {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            status: entry.status,
            data: entry.data.clone(),
            error: entry.error.clone(),
            is_stale: entry.is_stale(),
        }
    }
}

/// Observer-facing state of one observed key.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T> QueryState<T> {
    pub fn pending() -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}
