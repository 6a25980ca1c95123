//! Client-side distributed insert pipeline for a columnar OLAP database.
//!
//! Rows pushed into an [`Inserter`] are routed to one of the cluster's
//! replicas by a selector (plain or weighted round-robin), accumulated
//! into columnar batches by a per-replica shard worker, and flushed on a
//! timer over the wire client. Replica failure redirects the failed batch
//! to a surviving shard and feeds the selector's live membership.
//!
//! ```text
//! caller --push--> [selector] --> [shard data channel] --> [shard] --tick--> wire client
//!                      ^                                      |                  |
//!                      |                                      v                  v
//!                 state channel <------------------- liveness transitions   shared batches
//!                                                                          (failure handoff)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio_util::sync::CancellationToken;
//!
//! use chfan_block::{Row, RowShape};
//! use chfan_client::mock::MockDialer;
//! use chfan_inserter::{
//!     ClusterOptions, GlobalOptions, HostInfo, HostOptions, Inserter, RoundRobinSelector,
//! };
//!
//! struct Visit {
//!     url: String,
//! }
//!
//! impl Row for Visit {
//!     fn shape() -> RowShape<Self> {
//!         RowShape::builder().column("Url", |v: &Visit| &v.url).build()
//!     }
//! }
//!
//! # async fn run() -> Result<(), chfan_inserter::InserterError> {
//! let dialer = Arc::new(MockDialer::new());
//! let cluster = ClusterOptions::new(GlobalOptions::default().with_dialer(dialer))
//!     .with_host(HostOptions::new(HostInfo::new("replica-1:9000", "default")))
//!     .with_host(HostOptions::new(HostInfo::new("replica-2:9000", "default")));
//!
//! let inserter = Arc::new(Inserter::new(cluster, RoundRobinSelector::new())?);
//! let cancel = CancellationToken::new();
//!
//! let runner = tokio::spawn({
//!     let inserter = Arc::clone(&inserter);
//!     let cancel = cancel.clone();
//!     async move { inserter.start(&cancel, "visits").await }
//! });
//!
//! inserter.push(&cancel, Visit { url: "/".into() }).await?;
//! cancel.cancel();
//! let _ = runner.await;
//! # Ok(())
//! # }
//! ```

mod error;
mod host;
mod inserter;
mod metrics;
mod pool;
mod selector;
mod shard;

pub use error::{InserterError, MultiError};
pub use host::{Host, HostId, HostInfo, HostState, WeightedHostInfo};
pub use inserter::{
    ClusterOptions, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_PUSH_ATTEMPTS, DEFAULT_PUSH_TIMEOUT,
    DEFAULT_RECONNECT_TIMEOUT, GlobalOptions, HostOptions, Inserter, ShardErrHandler,
};
pub use metrics::{ShardMetrics, ShardMetricsSnapshot};
pub use selector::{
    HostSelector, HostStateController, RoundRobinSelector, WeightedRoundRobinSelector,
    listen_states,
};
