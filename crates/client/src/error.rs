//! Transport-level errors surfaced through `Listener::on_error`.

use std::time::Duration;

use thiserror::Error;

/// Failures of the underlying connection. None of these are fatal: the worst
/// case is "no live connection", which is always safe to retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The socket could not be established (refused, DNS, TLS, bad handshake).
    #[error("connection failed: {0}")]
    Connect(String),

    /// The socket failed after it was established.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The handshake did not complete within the connect timeout.
    #[error("handshake timed out after {}ms", .0.as_millis())]
    HandshakeTimeout(Duration),

    /// No async runtime was available to drive the socket or its timers.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),

    /// The resolved endpoint is not a valid WebSocket URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An outbound frame could not be queued on the socket.
    #[error("send failed: {0}")]
    Send(String),
}
