//! The dispatcher: public push surface over selector, shards and channels.
//!
//! ```text
//! push --> selector.pick --> per-shard data channel --> shard batch
//!                                                          | tick
//!                                                          v
//!                         shared-batches channel <--- wire client
//!                         (failure handoff)           |
//!                         state channel --------------+--> selector
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use chfan_block::{Batch, Row};
use chfan_client::{
    ClientOptions, Compression, DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_CONNECTIONS, Dialer, Setting,
    TlsOptions,
};

use crate::error::InserterError;
use crate::host::{Host, HostId};
use crate::metrics::{ShardMetrics, ShardMetricsSnapshot};
use crate::selector::{HostSelector, listen_states};
use crate::shard::Shard;

/// How long a shard accumulates rows before flushing a batch.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Pause between restarts of a failed shard.
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long one push attempt waits on a saturated shard before re-picking.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_millis(5);

/// Consecutive registry misses a push tolerates before backing off.
pub const DEFAULT_MAX_PUSH_ATTEMPTS: u32 = 5;

/// Rows a shard's data channel buffers ahead of the worker.
const DATA_CHANNEL_CAPACITY: usize = 1;

/// Failed batches the handoff channel parks; the smallest admissible bound.
const SHARED_CHANNEL_CAPACITY: usize = 1;

/// Options for one replica. Unset fields fall back to the cluster-wide
/// defaults in [`GlobalOptions`].
#[derive(Clone)]
pub struct HostOptions<H: Host> {
    pub host: H,
    pub user: Option<String>,
    pub password: Option<String>,
    pub quota_key: Option<String>,
    pub compression: Option<Compression>,
    pub settings: Vec<Setting>,
    pub dialer: Option<Arc<dyn Dialer>>,
    pub dial_timeout: Option<Duration>,
    pub tls: Option<TlsOptions>,
}

impl<H: Host> HostOptions<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            user: None,
            password: None,
            quota_key: None,
            compression: None,
            settings: Vec::new(),
            dialer: None,
            dial_timeout: None,
            tls: None,
        }
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_quota_key(mut self, quota_key: impl Into<String>) -> Self {
        self.quota_key = Some(quota_key.into());
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_setting(mut self, setting: Setting) -> Self {
        self.settings.push(setting);
        self
    }

    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = Some(timeout);
        self
    }

    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Cluster-wide connection defaults.
#[derive(Clone)]
pub struct GlobalOptions {
    /// Database used when a host's own database is empty.
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub quota_key: Option<String>,
    pub compression: Compression,
    pub settings: Vec<Setting>,
    pub dialer: Option<Arc<dyn Dialer>>,
    pub dial_timeout: Duration,
    pub tls: Option<TlsOptions>,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            database: "default".into(),
            user: None,
            password: None,
            quota_key: None,
            compression: Compression::default(),
            settings: Vec::new(),
            dialer: None,
            dial_timeout: chfan_client::DEFAULT_DIAL_TIMEOUT,
            tls: None,
        }
    }
}

impl GlobalOptions {
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }
}

/// The replica set handed to [`Inserter::new`].
#[derive(Clone)]
pub struct ClusterOptions<H: Host> {
    pub hosts: Vec<HostOptions<H>>,
    pub global: GlobalOptions,
}

impl<H: Host> Default for ClusterOptions<H> {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            global: GlobalOptions::default(),
        }
    }
}

impl<H: Host> ClusterOptions<H> {
    pub fn new(global: GlobalOptions) -> Self {
        Self {
            hosts: Vec::new(),
            global,
        }
    }

    pub fn with_host(mut self, host: HostOptions<H>) -> Self {
        self.hosts.push(host);
        self
    }
}

/// Per-replica options merged over the cluster defaults: a set field on
/// the host wins, everything else falls back to [`GlobalOptions`].
fn resolve_client_options<H: Host>(
    global: &GlobalOptions,
    options: &HostOptions<H>,
) -> ClientOptions {
    let info = options.host.info();
    let database = if info.database.is_empty() {
        global.database.clone()
    } else {
        info.database
    };

    ClientOptions {
        address: info.address,
        database,
        user: options.user.clone().or_else(|| global.user.clone()),
        password: options.password.clone().or_else(|| global.password.clone()),
        quota_key: options
            .quota_key
            .clone()
            .or_else(|| global.quota_key.clone()),
        compression: options.compression.unwrap_or(global.compression),
        settings: if options.settings.is_empty() {
            global.settings.clone()
        } else {
            options.settings.clone()
        },
        dial_timeout: options.dial_timeout.unwrap_or(global.dial_timeout),
        tls: options.tls.clone().or_else(|| global.tls.clone()),
        min_connections: DEFAULT_MIN_CONNECTIONS,
        max_connections: DEFAULT_MAX_CONNECTIONS,
    }
}

/// Invoked with every transient shard failure the restart loop absorbs.
pub type ShardErrHandler = Arc<dyn Fn(&InserterError) + Send + Sync>;

struct ShardHandle<R> {
    data: mpsc::Sender<R>,
    metrics: Arc<ShardMetrics>,
}

/// Distributes rows of `R` across the cluster's replicas.
pub struct Inserter<R: Row, S: HostSelector> {
    cluster: ClusterOptions<S::Host>,
    selector: Arc<S>,
    shards: Arc<DashMap<HostId, ShardHandle<R>>>,
    flush_interval: Duration,
    reconnect_timeout: Duration,
    push_timeout: Duration,
    max_push_attempts: u32,
    shard_err_handler: Option<ShardErrHandler>,
}

impl<R: Row, S: HostSelector> Inserter<R, S> {
    /// Registers every configured host with the selector. Fails on an
    /// empty cluster or when a host is rejected (typically because it was
    /// configured in the `Down` state).
    pub fn new(cluster: ClusterOptions<S::Host>, selector: S) -> Result<Self, InserterError> {
        if cluster.hosts.is_empty() {
            return Err(InserterError::EmptyCluster);
        }
        for options in &cluster.hosts {
            selector.add_host(options.host.clone())?;
        }

        Ok(Self {
            cluster,
            selector: Arc::new(selector),
            shards: Arc::new(DashMap::new()),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            max_push_attempts: DEFAULT_MAX_PUSH_ATTEMPTS,
            shard_err_handler: None,
        })
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_timeout = timeout;
        self
    }

    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    pub fn with_max_push_attempts(mut self, attempts: u32) -> Self {
        self.max_push_attempts = attempts;
        self
    }

    pub fn with_shard_err_handler(mut self, handler: ShardErrHandler) -> Self {
        self.shard_err_handler = Some(handler);
        self
    }

    /// Per-replica counter snapshots, keyed by replica identity.
    pub fn shard_metrics(&self) -> Vec<(HostId, ShardMetricsSnapshot)> {
        self.shards
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics.snapshot()))
            .collect()
    }

    /// Dials every replica, spawns the shard workers and the state
    /// listener, and supervises them until cancellation or the first
    /// terminal error. Transient shard failures restart the shard after
    /// `reconnect_timeout`; cancellation and elapsed deadlines propagate.
    pub async fn start(&self, cancel: &CancellationToken, table: &str) -> Result<(), InserterError> {
        let (state_tx, state_rx) = async_channel::bounded::<S::Host>(self.cluster.hosts.len());
        let (shared_tx, shared_rx) = async_channel::bounded::<Batch<R>>(SHARED_CHANNEL_CAPACITY);

        let child = cancel.child_token();
        let mut tasks: JoinSet<Result<(), InserterError>> = JoinSet::new();

        {
            let selector = Arc::clone(&self.selector);
            let cancel = child.clone();
            tasks.spawn(async move { listen_states(&cancel, selector.as_ref(), state_rx).await });
        }

        for options in &self.cluster.hosts {
            let host = options.host.clone();
            let info = host.info();
            let Some(dialer) = options
                .dialer
                .clone()
                .or_else(|| self.cluster.global.dialer.clone())
            else {
                child.cancel();
                while tasks.join_next().await.is_some() {}
                self.shards.clear();
                return Err(InserterError::NoDialer(info.id()));
            };

            let client_options = resolve_client_options(&self.cluster.global, options);
            let shard: Shard<R, S::Host> =
                match Shard::connect(dialer.as_ref(), host, client_options).await {
                    Ok(shard) => shard,
                    Err(err) => {
                        child.cancel();
                        while tasks.join_next().await.is_some() {}
                        self.shards.clear();
                        return Err(err);
                    }
                };

            let (data_tx, mut data_rx) = mpsc::channel::<R>(DATA_CHANNEL_CAPACITY);
            self.shards.insert(
                info.id(),
                ShardHandle {
                    data: data_tx,
                    metrics: shard.metrics(),
                },
            );

            let cancel = child.clone();
            let shared_tx = shared_tx.clone();
            let shared_rx = shared_rx.clone();
            let state_tx = state_tx.clone();
            let table = table.to_owned();
            let flush_interval = self.flush_interval;
            let reconnect_timeout = self.reconnect_timeout;
            let handler = self.shard_err_handler.clone();

            tasks.spawn(async move {
                let result = loop {
                    let run = shard
                        .run(
                            &cancel,
                            flush_interval,
                            &table,
                            &mut data_rx,
                            &shared_tx,
                            &shared_rx,
                            &state_tx,
                        )
                        .await;

                    match run {
                        // The data sender is gone: the dispatcher is shutting down.
                        Ok(()) => break Ok(()),
                        Err(err) if err.is_cancel() || err.is_deadline() => break Err(err),
                        Err(err) => {
                            tracing::warn!(host = %info, error = %err, "shard failed, scheduling restart");
                            if let Some(handler) = &handler {
                                handler(&err);
                            }
                            tokio::time::sleep(reconnect_timeout).await;
                            if cancel.is_cancelled() {
                                break Err(InserterError::Canceled);
                            }
                        }
                    }
                };
                shard.close().await;
                result
            });
        }

        // The workers hold their own clones; dropping ours lets the state
        // listener observe a closed channel once every shard has exited.
        drop(state_tx);
        drop(shared_tx);
        drop(shared_rx);

        let mut first: Option<InserterError> = None;
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(join_err) => Err(InserterError::Task(join_err.to_string())),
            };
            if let Err(err) = result
                && first.is_none()
            {
                first = Some(err);
                child.cancel();
            }
        }

        self.shards.clear();
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Queues one row onto some up replica's shard.
    ///
    /// The selector picks a replica; a saturated or not-yet-registered
    /// shard makes the push wait at most `push_timeout` and then re-pick,
    /// shedding load onto less saturated shards. Only cancellation is
    /// surfaced to the caller; transient shard failures stay behind the
    /// retry loop.
    pub async fn push(&self, cancel: &CancellationToken, row: R) -> Result<(), InserterError> {
        let mut row = row;
        let mut misses = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(InserterError::Canceled);
            }

            let picked = self.selector.pick();
            let Some(sender) = self
                .shards
                .get(&picked.id())
                .map(|handle| handle.data.clone())
            else {
                // The selector can hand out a replica whose shard has not
                // registered yet; back off after a burst of misses.
                self.push_back_off(&mut misses).await;
                continue;
            };

            row = match sender.try_send(row) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(row)) => {
                    tokio::select! {
                        sent = sender.send_timeout(row, self.push_timeout) => match sent {
                            Ok(()) => return Ok(()),
                            Err(SendTimeoutError::Timeout(row)) => row,
                            Err(SendTimeoutError::Closed(row)) => row,
                        },
                        _ = cancel.cancelled() => return Err(InserterError::Canceled),
                    }
                }
                // The shard is restarting; pick again after a back-off.
                Err(TrySendError::Closed(row)) => {
                    self.push_back_off(&mut misses).await;
                    row
                }
            };
        }
    }

    #[cfg(test)]
    pub(crate) fn selector_for_tests(&self) -> &S {
        &self.selector
    }

    async fn push_back_off(&self, misses: &mut u32) {
        *misses += 1;
        if *misses >= self.max_push_attempts {
            *misses = 0;
            tokio::time::sleep(self.push_timeout).await;
        }
    }
}

#[cfg(test)]
#[path = "inserter_test.rs"]
mod inserter_test;
