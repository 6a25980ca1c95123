//! Wire client errors.

/// Errors from dialing or querying a replica.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The client was terminally closed.
    #[error("client is closed")]
    Closed,

    /// The operation was canceled by its caller.
    #[error("operation canceled")]
    Canceled,

    /// The operation's deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Transport-level failure (dial, read, write).
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the query.
    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },
}

impl ClientError {
    pub fn is_cancel(&self) -> bool {
        matches!(self, ClientError::Canceled)
    }

    pub fn is_deadline(&self) -> bool {
        matches!(self, ClientError::DeadlineExceeded)
    }
}
