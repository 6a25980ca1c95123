//! Dispatcher, selector and shard errors.

use std::fmt;

use chfan_block::SchemaError;
use chfan_client::ClientError;

use crate::host::{HostId, HostState};

/// Errors surfaced by the insert pipeline.
#[derive(Debug, thiserror::Error)]
pub enum InserterError {
    /// A selector was handed a host in the wrong liveness state.
    #[error("host {host} must be {expected}, but is {actual}")]
    InvalidHostState {
        host: HostId,
        expected: HostState,
        actual: HostState,
    },

    /// The weighted selector rejects weightless hosts.
    #[error("host weight must be non-zero")]
    ZeroWeight,

    /// Shard startup contract: the flush ticker needs a period.
    #[error("flush interval must be greater than zero")]
    InvalidFlushInterval,

    /// Shard startup contract: liveness transitions must never block the
    /// announcing shard on an absent listener.
    #[error("state channel must be buffered")]
    StateChannelUnbuffered,

    /// The cluster configuration lists no hosts.
    #[error("cluster configuration has no hosts")]
    EmptyCluster,

    /// Neither the host nor the cluster defaults provide a dialer.
    #[error("no dialer configured for host {0}")]
    NoDialer(HostId),

    /// The operation was canceled by its caller.
    #[error("operation canceled")]
    Canceled,

    /// The operation's deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A supervised task died without reporting a result.
    #[error("task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// Several failures collected while a shard wound down.
    #[error(transparent)]
    Multiple(MultiError),
}

impl InserterError {
    /// True when this error (or any error it aggregates) is a
    /// cancellation. Cancellations propagate unwrapped and never trigger
    /// shard restarts.
    pub fn is_cancel(&self) -> bool {
        match self {
            InserterError::Canceled => true,
            InserterError::Client(client) => client.is_cancel(),
            InserterError::Multiple(errors) => errors.errors().iter().any(InserterError::is_cancel),
            _ => false,
        }
    }

    /// True when this error (or any error it aggregates) is an elapsed
    /// deadline.
    pub fn is_deadline(&self) -> bool {
        match self {
            InserterError::DeadlineExceeded => true,
            InserterError::Client(client) => client.is_deadline(),
            InserterError::Multiple(errors) => {
                errors.errors().iter().any(InserterError::is_deadline)
            }
            _ => false,
        }
    }
}

/// Failures accumulated from a shard's outstanding submissions.
#[derive(Debug)]
pub struct MultiError(Vec<InserterError>);

impl MultiError {
    pub fn errors(&self) -> &[InserterError] {
        &self.0
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

/// Collapses collected errors: none, the single error, or a multi-error.
pub(crate) fn fold_errors(mut errors: Vec<InserterError>) -> Option<InserterError> {
    match errors.len() {
        0 => None,
        1 => Some(errors.remove(0)),
        _ => Some(InserterError::Multiple(MultiError(errors))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_keeps_single_errors_unwrapped() {
        assert!(fold_errors(Vec::new()).is_none());

        match fold_errors(vec![InserterError::Canceled]) {
            Some(InserterError::Canceled) => {}
            other => panic!("expected bare cancellation, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_is_seen_through_aggregates() {
        let folded = fold_errors(vec![
            InserterError::Client(ClientError::Network("boom".into())),
            InserterError::Canceled,
        ])
        .unwrap();

        assert!(folded.is_cancel());
        assert!(!folded.is_deadline());
        assert_eq!(
            folded.to_string(),
            "network error: boom; operation canceled",
        );
    }

    #[test]
    fn deadline_is_seen_through_client_errors() {
        let error = InserterError::Client(ClientError::DeadlineExceeded);
        assert!(error.is_deadline());
        assert!(!error.is_cancel());
    }
}
