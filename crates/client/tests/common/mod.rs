//! Recording transport and listener shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use sysnotify_client::ws::{Socket, Transport, TransportEvents};
use sysnotify_client::{
    CloseEvent, ConnectionState, Listener, NotificationEvent, SystemMessage, TransportError,
};
use url::Url;

/// One socket handed out by [`MockTransport`].
#[derive(Clone)]
pub struct MockSocket {
    pub url: Url,
    pub events: TransportEvents,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub closed_with: Arc<Mutex<Option<u16>>>,
}

impl MockSocket {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn closed_with(&self) -> Option<u16> {
        *self.closed_with.lock()
    }
}

impl Socket for MockSocket {
    fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.sent.lock().push(text);
        Ok(())
    }

    fn close(&self, code: u16) {
        *self.closed_with.lock() = Some(code);
    }
}

/// Records every socket it opens; tests drive the events by hand.
#[derive(Clone, Default)]
pub struct MockTransport {
    sockets: Arc<Mutex<Vec<MockSocket>>>,
    fail_with: Arc<Mutex<Option<TransportError>>>,
}

impl MockTransport {
    pub fn opened(&self) -> usize {
        self.sockets.lock().len()
    }

    pub fn socket(&self, index: usize) -> MockSocket {
        self.sockets.lock()[index].clone()
    }

    pub fn last(&self) -> MockSocket {
        self.sockets
            .lock()
            .last()
            .cloned()
            .expect("no socket opened")
    }

    pub fn fail_next_open(&self, error: TransportError) {
        *self.fail_with.lock() = Some(error);
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &Url, events: TransportEvents) -> Result<Box<dyn Socket>, TransportError> {
        if let Some(error) = self.fail_with.lock().take() {
            return Err(error);
        }
        let socket = MockSocket {
            url: url.clone(),
            events,
            sent: Arc::default(),
            closed_with: Arc::default(),
        };
        self.sockets.lock().push(socket.clone());
        Ok(Box::new(socket))
    }
}

/// Listener that keeps every callback in order.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<NotificationEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().clone()
    }

    pub fn messages(&self) -> Vec<SystemMessage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotificationEvent::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn opens(&self) -> usize {
        self.count(|e| matches!(e, NotificationEvent::Opened))
    }

    pub fn closes(&self) -> Vec<CloseEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotificationEvent::Closed(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<TransportError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotificationEvent::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotificationEvent::StateChanged(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&NotificationEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl Listener for Recorder {
    fn on_open(&self) {
        self.events.lock().push(NotificationEvent::Opened);
    }

    fn on_message(&self, message: SystemMessage) {
        self.events.lock().push(NotificationEvent::Message(message));
    }

    fn on_close(&self, event: &CloseEvent) {
        self.events.lock().push(NotificationEvent::Closed(event.clone()));
    }

    fn on_error(&self, error: &TransportError) {
        self.events.lock().push(NotificationEvent::Error(error.clone()));
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.events
            .lock()
            .push(NotificationEvent::StateChanged(state));
    }
}
