//! Per-replica shard worker.
//!
//! One worker per replica drains its data channel into an open batch,
//! flushes the batch on a fixed tick, and announces its liveness on the
//! state channel. A failed flush hands the batch to the shared-batches
//! channel so a surviving peer resubmits it; the handoff is bounded to
//! half the flush interval so a cluster-wide outage cannot deadlock the
//! workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use chfan_block::{Batch, Row};
use chfan_client::{Client, ClientOptions, Dialer, Query};

use crate::error::{InserterError, fold_errors};
use crate::host::{Host, HostState};
use crate::metrics::ShardMetrics;
use crate::pool::BatchPool;

/// Batches a shard keeps pooled between flushes.
pub(crate) const POOL_CAPACITY: usize = 4;

/// Result of one submission task, reported exactly once per submission.
enum Submit {
    Done,
    Failed(InserterError),
}

pub(crate) struct Shard<R: Row, H: Host> {
    host: H,
    client: Arc<dyn Client>,
    pool: BatchPool<R>,
    metrics: Arc<ShardMetrics>,
    inflight: AtomicI64,
}

impl<R: Row, H: Host> Shard<R, H> {
    /// Dials the replica and validates the row schema once, so pool
    /// allocation inside the worker loop cannot fail on shape errors.
    pub(crate) async fn connect(
        dialer: &dyn Dialer,
        host: H,
        options: ClientOptions,
    ) -> Result<Self, InserterError> {
        let client = dialer.dial(options).await?;
        Batch::<R>::new()?;

        Ok(Self {
            host,
            client,
            pool: BatchPool::new(POOL_CAPACITY),
            metrics: Arc::new(ShardMetrics::new()),
            inflight: AtomicI64::new(0),
        })
    }

    pub(crate) fn metrics(&self) -> Arc<ShardMetrics> {
        Arc::clone(&self.metrics)
    }

    pub(crate) async fn close(&self) {
        let _ = self.client.close().await;
    }

    /// Runs the worker until cancellation, a terminal submission error, or
    /// a closed data channel. Announces `Up` on entry and, unless the exit
    /// reason is cancellation, `Down` on the way out.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn run(
        &self,
        cancel: &CancellationToken,
        flush_interval: Duration,
        table: &str,
        data: &mut mpsc::Receiver<R>,
        shared_tx: &async_channel::Sender<Batch<R>>,
        shared_rx: &async_channel::Receiver<Batch<R>>,
        states: &async_channel::Sender<H>,
    ) -> Result<(), InserterError> {
        if flush_interval.is_zero() {
            return Err(InserterError::InvalidFlushInterval);
        }
        if states.capacity() == Some(0) {
            return Err(InserterError::StateChannelUnbuffered);
        }

        let host = self.host.info();
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let mut ticker = time::interval_at(time::Instant::now() + flush_interval, flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::select! {
            sent = states.send(self.host.clone().with_state(HostState::Up)) => {
                if sent.is_err() {
                    return Err(InserterError::Canceled);
                }
            }
            _ = cancel.cancelled() => return Err(InserterError::Canceled),
        }
        tracing::info!(host = %host, flush_interval_ms = flush_interval.as_millis() as u64, "shard started");

        let mut batch = self.pool.get()?;
        let mut errors: Vec<InserterError> = Vec::new();

        loop {
            tokio::select! {
                row = data.recv() => match row {
                    Some(row) => {
                        batch.append(&row);
                        self.metrics.record_row_received();
                    }
                    // The dispatcher dropped the data sender: clean stop.
                    None => break,
                },
                redirected = shared_rx.recv() => match redirected {
                    Ok(peer_batch) => {
                        self.submit(peer_batch, table, flush_interval, shared_tx, &outcome_tx, cancel);
                    }
                    Err(_) => break,
                },
                _ = ticker.tick() => {
                    let fresh = match self.pool.get() {
                        Ok(fresh) => fresh,
                        Err(err) => {
                            errors.push(err.into());
                            break;
                        }
                    };
                    let full = std::mem::replace(&mut batch, fresh);
                    self.submit(full, table, flush_interval, shared_tx, &outcome_tx, cancel);
                }
                _ = cancel.cancelled() => {
                    errors.push(InserterError::Canceled);
                    break;
                }
                outcome = outcome_rx.recv() => if let Some(outcome) = outcome {
                    self.inflight.fetch_sub(1, Ordering::AcqRel);
                    if let Submit::Failed(err) = outcome {
                        errors.push(err);
                        break;
                    }
                },
            }
        }

        // Collect the outcome of every submission still in flight. Each
        // submission reports exactly once, so this always terminates.
        while self.inflight.load(Ordering::Acquire) > 0 {
            let Some(outcome) = outcome_rx.recv().await else {
                break;
            };
            self.inflight.fetch_sub(1, Ordering::AcqRel);
            if let Submit::Failed(err) = outcome {
                errors.push(err);
            }
        }

        let canceled = errors.iter().any(InserterError::is_cancel);
        if !canceled {
            tokio::select! {
                _ = states.send(self.host.clone().with_state(HostState::Down)) => {}
                _ = cancel.cancelled() => errors.push(InserterError::Canceled),
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            host = %host,
            rows_received = snapshot.rows_received,
            batches_flushed = snapshot.batches_flushed,
            rows_flushed = snapshot.rows_flushed,
            flush_errors = snapshot.flush_errors,
            batches_redirected = snapshot.batches_redirected,
            batches_dropped = snapshot.batches_dropped,
            "shard stopped"
        );

        match fold_errors(errors) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Launches one submission task for `batch`.
    ///
    /// On success the batch returns to the pool. On failure it is handed
    /// to the shared-batches channel with a bounded wait and never returns
    /// to the pool, so a poisoned block cannot leak into later flushes. A
    /// canceled query reports a plain cancellation with no handoff.
    fn submit(
        &self,
        batch: Batch<R>,
        table: &str,
        flush_interval: Duration,
        shared_tx: &async_channel::Sender<Batch<R>>,
        outcomes: &mpsc::UnboundedSender<Submit>,
        cancel: &CancellationToken,
    ) {
        self.inflight.fetch_add(1, Ordering::AcqRel);

        let client = Arc::clone(&self.client);
        let pool = self.pool.clone();
        let metrics = Arc::clone(&self.metrics);
        let shared_tx = shared_tx.clone();
        let outcomes = outcomes.clone();
        let cancel = cancel.clone();
        let table = table.to_owned();
        let host = self.host.info();

        tokio::spawn(async move {
            let rows = batch.rows() as u64;
            let query = Query {
                body: batch.query_body(&table),
                input: batch.input(),
            };

            let outcome = match client.execute(&cancel, query).await {
                Ok(()) => {
                    metrics.record_flush(rows);
                    tracing::debug!(host = %host, rows, "flushed batch");
                    pool.put(batch);
                    Submit::Done
                }
                Err(err) if err.is_cancel() => Submit::Failed(InserterError::Canceled),
                Err(err) => {
                    metrics.record_flush_error();
                    match time::timeout(flush_interval / 2, shared_tx.send(batch)).await {
                        Ok(Ok(())) => {
                            metrics.record_batch_redirected();
                            tracing::warn!(host = %host, error = %err, rows, "flush failed, batch handed to peers");
                        }
                        _ => {
                            metrics.record_batch_dropped();
                            tracing::warn!(host = %host, error = %err, rows, "flush failed, dropping batch");
                        }
                    }
                    Submit::Failed(err.into())
                }
            };
            let _ = outcomes.send(outcome);
        });
    }
}

#[cfg(test)]
#[path = "shard_test.rs"]
mod shard_test;
