//! Connection state and the transport seam.
//!
//! A [`Transport`] opens sockets; a [`Socket`] accepts outbound frames and close
//! requests; [`TransportEvents`] is how the socket reports back. The manager is
//! the only consumer of these events, and it ignores events from any socket
//! other than the one it currently owns.

use std::sync::Weak;

use url::Url;

use crate::error::TransportError;

/// Lifecycle of the single logical connection owned by a manager.
///
/// `Idle → Connecting → Open → Closing → Closed`, with `Closed → Connecting`
/// on retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match next {
            Connecting => matches!(self, Idle | Closed),
            Open => matches!(self, Connecting),
            Closing | Closed => !matches!(self, Idle),
            Idle => false,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Close notification delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
}

impl CloseEvent {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Clean closure (code 1000); anything else is abnormal.
    pub fn is_normal(&self) -> bool {
        self.code == sysnotify_shared::NORMAL_CLOSURE
    }
}

/// Opens sockets to a resolved endpoint.
pub trait Transport: Send + Sync + 'static {
    /// Start opening a socket to `url`.
    ///
    /// The handshake must proceed asynchronously: `events` must not be invoked
    /// before `open` returns. Every socket reports `closed` exactly once, and an
    /// `error` is always followed by `closed`.
    fn open(&self, url: &Url, events: TransportEvents) -> Result<Box<dyn Socket>, TransportError>;
}

/// One open (or opening) socket.
pub trait Socket: Send {
    /// Queue a text frame for writing.
    fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Close the socket with the given close code.
    fn close(&self, code: u16);
}

/// Receiver side of transport events, implemented by the connection manager.
pub(crate) trait EventSink: Send + Sync {
    fn on_transport_open(&self, attempt: u64);
    fn on_transport_message(&self, attempt: u64, text: &str);
    fn on_transport_close(&self, attempt: u64, event: CloseEvent);
    fn on_transport_error(&self, attempt: u64, error: TransportError);
}

/// Callback handle given to a transport for one connect attempt.
///
/// Holds only a weak reference to its manager: once the manager is gone the
/// handle silently does nothing.
#[derive(Clone)]
pub struct TransportEvents {
    sink: Weak<dyn EventSink>,
    attempt: u64,
}

impl TransportEvents {
    pub(crate) fn new(sink: Weak<dyn EventSink>, attempt: u64) -> Self {
        Self { sink, attempt }
    }

    /// Identifier of the connect attempt this handle belongs to.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// The handshake completed.
    pub fn opened(&self) {
        if let Some(sink) = self.sink.upgrade() {
            sink.on_transport_open(self.attempt);
        }
    }

    /// A text frame arrived.
    pub fn message(&self, text: &str) {
        if let Some(sink) = self.sink.upgrade() {
            sink.on_transport_message(self.attempt, text);
        }
    }

    /// The socket closed.
    pub fn closed(&self, code: u16, reason: &str) {
        if let Some(sink) = self.sink.upgrade() {
            sink.on_transport_close(self.attempt, CloseEvent::new(code, reason));
        }
    }

    /// The socket failed; `closed` follows.
    pub fn error(&self, error: TransportError) {
        if let Some(sink) = self.sink.upgrade() {
            sink.on_transport_error(self.attempt, error);
        }
    }
}

impl std::fmt::Debug for TransportEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEvents")
            .field("attempt", &self.attempt)
            .field("live", &(self.sink.strong_count() > 0))
            .finish()
    }
}

mod connection_native;
pub use connection_native::TungsteniteTransport;
