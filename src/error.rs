//! Unified error handling for skald.
//!
//! One hierarchy covers the whole backend contract: configuration problems
//! are fatal at construction, connection-setup problems are fatal to start,
//! and per-line problems are carried as distinct variants so the host loop
//! can tell the recoverable ones apart.

use skald_proto::ProtocolError;
use thiserror::Error;

/// Errors surfaced by a chat backend through the capability contract.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid backend configuration. Fatal at construction, never retried.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dialing or transport setup failed. Fatal to start.
    #[error("connection setup failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Building the transport-encryption configuration failed.
    #[error("tls error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// No inbound line arrived within the dial timeout. Fatal to start,
    /// distinguishable from other start failures.
    #[error("timed out waiting for the server to start talking")]
    LivenessTimeout,

    /// Operation requires an established connection.
    #[error("not connected")]
    NotConnected,

    /// The inbound queue is closed; no further events will arrive.
    #[error("connection closed")]
    Closed,

    /// A line matched none of the recognized shapes. Recoverable; log it
    /// and keep receiving.
    #[error("line does not match any recognized shape: {0:?}")]
    MalformedLine(String),

    /// The peer sent a fatal protocol error; the session is no longer
    /// usable.
    #[error("server error: {0}")]
    Server(String),

    /// Wire-level failure from the codec.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// I/O failure on the transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Whether the consumer may log this error and keep receiving.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedLine(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_malformed_lines_are_recoverable() {
        assert!(ApiError::MalformedLine("bogus".to_string()).is_recoverable());
        assert!(!ApiError::LivenessTimeout.is_recoverable());
        assert!(!ApiError::Server("bye".to_string()).is_recoverable());
        assert!(!ApiError::Closed.is_recoverable());
    }
}
