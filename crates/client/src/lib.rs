//! Wire client seam for the native block protocol.
//!
//! The insert pipeline treats the protocol client as an external
//! collaborator: anything that can run an insert query carrying a columnar
//! [`Input`] block satisfies [`Client`], and anything that can open one
//! satisfies [`Dialer`]. The [`mock`] module ships an in-memory
//! implementation used throughout the test suites.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use chfan_block::Input;

mod error;
mod options;

/// In-memory client and dialer for tests and examples.
pub mod mock;

pub use error::ClientError;
pub use options::{
    ClientOptions, Compression, DEFAULT_DIAL_TIMEOUT, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_MIN_CONNECTIONS, Setting, TlsOptions,
};

/// One insert query: the statement head plus the columnar block it carries.
pub struct Query<'a> {
    pub body: String,
    pub input: &'a Input,
}

/// A connection (or connection pool) to one replica.
#[async_trait]
pub trait Client: Send + Sync + std::fmt::Debug + 'static {
    /// Runs the query, honoring `cancel`.
    ///
    /// Must return [`ClientError::Canceled`] when `cancel` fires mid-query
    /// and [`ClientError::Closed`] after [`Client::close`].
    async fn execute(&self, cancel: &CancellationToken, query: Query<'_>)
    -> Result<(), ClientError>;

    /// Terminally closes the client.
    async fn close(&self) -> Result<(), ClientError>;
}

/// Opens [`Client`]s from per-replica options.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, options: ClientOptions) -> Result<Arc<dyn Client>, ClientError>;
}
