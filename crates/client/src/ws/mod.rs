//! Real-time system notification channel.
//!
//! This module provides:
//! - One managed WebSocket connection per [`ConnectionManager`]
//! - A guard against duplicate sockets and post-teardown callbacks
//! - Fixed-delay reconnection after abnormal closes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 ConnectionManager                   │
//! │   state machine · ConnectionGuard · timers          │
//! └─────────────────────────────────────────────────────┘
//!        │ resolve              │ open            ▲ events
//!        ▼                      ▼                 │
//! ┌──────────────────┐   ┌────────────────────────────┐
//! │ EndpointResolver │   │ Transport / Socket         │
//! │ (+ TokenProvider)│   │ (tokio-tungstenite, mocks) │
//! └──────────────────┘   └────────────────────────────┘
//!                                      │ text frames
//!                                      ▼
//!                        ┌────────────────────────────┐
//!                        │ protocol::decode           │
//!                        └────────────────────────────┘
//!                                      │ SystemMessage
//!                                      ▼
//!                        ┌────────────────────────────┐
//!                        │ Listener (callbacks,       │
//!                        │  channel, dioxus signals)  │
//!                        └────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let (listener, mut events) = ChannelListener::new();
//! let manager = ConnectionManager::with_tungstenite(
//!     ClientConfig::from_env(),
//!     Arc::new(StaticToken::new("t1")),
//!     Arc::new(listener),
//! );
//! manager.connect();
//!
//! while let Some(event) = events.next().await {
//!     if let NotificationEvent::Message(msg) = event {
//!         println!("{}: {}", msg.message_type, msg.message);
//!     }
//! }
//! ```

mod connection;
mod guard;
#[cfg(feature = "dioxus")]
mod hooks;
mod listener;
mod manager;
mod reconnect;
mod timer;

pub use connection::{
    CloseEvent, ConnectionState, Socket, Transport, TransportEvents, TungsteniteTransport,
};
pub use guard::ConnectionGuard;
pub use listener::{ChannelListener, FnListener, Listener, NotificationEvent};
pub use manager::ConnectionManager;
pub use reconnect::ReconnectScheduler;
pub use timer::{spawn_after, TimerHandle};

#[cfg(feature = "dioxus")]
pub use hooks::{use_system_messages, SystemMessageFeed};
