//! Bounded lock-free pool of reusable batches.
//!
//! Acquire never blocks: an empty pool falls back to allocation. Returned
//! batches are reset first; when the pool is full the batch is dropped on
//! the floor, which is safe because a pooled batch holds no external
//! references.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use chfan_block::{Batch, Row, SchemaError};

pub(crate) struct BatchPool<R: Row> {
    queue: Arc<ArrayQueue<Batch<R>>>,
}

impl<R: Row> Clone for BatchPool<R> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<R: Row> BatchPool<R> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
        }
    }

    /// Pops a pooled batch, or allocates a fresh one.
    pub(crate) fn get(&self) -> Result<Batch<R>, SchemaError> {
        match self.queue.pop() {
            Some(batch) => Ok(batch),
            None => Batch::new(),
        }
    }

    /// Resets the batch and returns it; drops it when the pool is full.
    pub(crate) fn put(&self, mut batch: Batch<R>) {
        batch.reset();
        let _ = self.queue.push(batch);
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
