//! Dioxus binding: ties a manager to a component's lifetime.
//!
//! The manager connects when the component mounts and is torn down when the
//! component is dropped, so a handshake still in flight at unmount never
//! reaches the component.

use std::rc::Rc;
use std::sync::Arc;

use dioxus::prelude::*;
use sysnotify_shared::SystemMessage;

use super::connection::{ConnectionState, TungsteniteTransport};
use super::listener::Listener;
use super::manager::ConnectionManager;
use crate::config::ClientConfig;
use crate::endpoint::TokenProvider;

/// Reactive view of the notification channel for one component.
#[derive(Clone)]
pub struct SystemMessageFeed {
    pub messages: SyncSignal<Vec<SystemMessage>>,
    pub state: SyncSignal<ConnectionState>,
    manager: Rc<ConnectionManager>,
}

impl SystemMessageFeed {
    pub fn send(&self, text: &str) -> bool {
        self.manager.send(text)
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }
}

struct SignalListener {
    messages: SyncSignal<Vec<SystemMessage>>,
    state: SyncSignal<ConnectionState>,
}

impl Listener for SignalListener {
    fn on_message(&self, message: SystemMessage) {
        let mut messages = self.messages;
        messages.write().push(message);
    }

    fn on_state_change(&self, state: ConnectionState) {
        let mut signal = self.state;
        signal.set(state);
    }
}

/// Connect on mount, disconnect on drop.
pub fn use_system_messages(
    config: ClientConfig,
    tokens: Arc<dyn TokenProvider>,
) -> SystemMessageFeed {
    let messages = use_signal_sync(Vec::<SystemMessage>::new);
    let state = use_signal_sync(|| ConnectionState::Idle);

    let manager = use_hook(move || {
        let listener = Arc::new(SignalListener { messages, state });
        let manager = ConnectionManager::new(config, tokens, TungsteniteTransport, listener);
        manager.connect();
        Rc::new(manager)
    });

    let on_drop = manager.clone();
    use_drop(move || on_drop.disconnect());

    SystemMessageFeed {
        messages,
        state,
        manager,
    }
}
