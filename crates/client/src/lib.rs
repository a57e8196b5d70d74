//! Sysnotify Client - real-time system notification channel
//!
//! Maintains one long-lived WebSocket to the notification endpoint, decodes
//! server-pushed `system_message` frames and hands them to a [`ws::Listener`],
//! reconnecting on its own after abnormal closes.

pub mod auth_session;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod storage;
pub mod ws;

pub use auth_session::{AuthSession, SessionTokenProvider};
pub use config::{ClientConfig, EndpointCandidate};
pub use endpoint::{EndpointConfig, EndpointResolver, Scheme, StaticToken, TokenProvider};
pub use error::TransportError;
pub use sysnotify_shared::{DecodeError, MessageType, SystemMessage};
pub use ws::{
    ChannelListener, CloseEvent, ConnectionManager, ConnectionState, Listener, NotificationEvent,
};
