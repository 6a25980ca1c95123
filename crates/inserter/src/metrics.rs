//! Shard worker counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters one shard worker maintains over its lifetime. Shared between
/// the worker, its submission tasks and the dispatcher's handle.
#[derive(Debug, Default)]
pub struct ShardMetrics {
    /// Rows received from the data channel.
    pub rows_received: AtomicU64,

    /// Batches written to the wire client.
    pub batches_flushed: AtomicU64,

    /// Rows written to the wire client.
    pub rows_flushed: AtomicU64,

    /// Failed submissions.
    pub flush_errors: AtomicU64,

    /// Failed batches handed to peer shards.
    pub batches_redirected: AtomicU64,

    /// Failed batches dropped because no peer accepted them in time.
    pub batches_dropped: AtomicU64,
}

impl ShardMetrics {
    pub const fn new() -> Self {
        Self {
            rows_received: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            rows_flushed: AtomicU64::new(0),
            flush_errors: AtomicU64::new(0),
            batches_redirected: AtomicU64::new(0),
            batches_dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_row_received(&self) {
        self.rows_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_flush(&self, rows: u64) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.rows_flushed.fetch_add(rows, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_flush_error(&self) {
        self.flush_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_batch_redirected(&self) {
        self.batches_redirected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_batch_dropped(&self) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ShardMetricsSnapshot {
        ShardMetricsSnapshot {
            rows_received: self.rows_received.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            rows_flushed: self.rows_flushed.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
            batches_redirected: self.batches_redirected.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of one shard's counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShardMetricsSnapshot {
    pub rows_received: u64,
    pub batches_flushed: u64,
    pub rows_flushed: u64,
    pub flush_errors: u64,
    pub batches_redirected: u64,
    pub batches_dropped: u64,
}
