//! Caller-facing event delivery.

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use sysnotify_shared::SystemMessage;

use super::connection::{CloseEvent, ConnectionState};
use crate::error::TransportError;

/// Observer injected into a [`ConnectionManager`](super::ConnectionManager).
///
/// Callbacks run on whichever thread the transport reports from and are never
/// invoked after `disconnect()` has returned.
pub trait Listener: Send + Sync {
    fn on_open(&self) {}

    fn on_message(&self, message: SystemMessage);

    fn on_close(&self, _event: &CloseEvent) {}

    fn on_error(&self, _error: &TransportError) {}

    fn on_state_change(&self, _state: ConnectionState) {}
}

/// Everything a [`ChannelListener`] forwards.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Opened,
    Message(SystemMessage),
    Closed(CloseEvent),
    Error(TransportError),
    StateChanged(ConnectionState),
}

/// Forwards every callback as a [`NotificationEvent`] over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: UnboundedSender<NotificationEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, UnboundedReceiver<NotificationEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    fn forward(&self, event: NotificationEvent) {
        if self.sender.unbounded_send(event).is_err() {
            crate::log_debug!("Notification receiver dropped, discarding event");
        }
    }
}

impl Listener for ChannelListener {
    fn on_open(&self) {
        self.forward(NotificationEvent::Opened);
    }

    fn on_message(&self, message: SystemMessage) {
        self.forward(NotificationEvent::Message(message));
    }

    fn on_close(&self, event: &CloseEvent) {
        self.forward(NotificationEvent::Closed(event.clone()));
    }

    fn on_error(&self, error: &TransportError) {
        self.forward(NotificationEvent::Error(error.clone()));
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.forward(NotificationEvent::StateChanged(state));
    }
}

/// Message-only listener from a closure.
pub struct FnListener<F>(pub F);

impl<F> Listener for FnListener<F>
where
    F: Fn(SystemMessage) + Send + Sync,
{
    fn on_message(&self, message: SystemMessage) {
        (self.0)(message)
    }
}
