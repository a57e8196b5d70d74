//! Connection manager: owns the one logical connection and drives its state
//! machine.
//!
//! | From        | Event                          | To         |
//! |-------------|--------------------------------|------------|
//! | Idle/Closed | `connect()`                    | Connecting |
//! | Connecting  | handshake timeout              | Closed     |
//! | Connecting  | open (guard live)              | Open       |
//! | Connecting  | open (guard torn down)         | Closed     |
//! | Open        | close, code 1000               | Closed     |
//! | Open        | close, other code              | Closed + reconnect in 10s |
//! | any         | `disconnect()`                 | Closed     |
//!
//! All mutation happens under one mutex. Listener callbacks are dispatched after
//! the lock is released, so a listener may call back into the manager.
//! Delivery holds a separate reentrant lock that `disconnect()` also takes, and
//! each notice re-checks the guard; once `disconnect()` returns nothing more is
//! delivered.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use sysnotify_shared::{protocol, SystemMessage, NORMAL_CLOSURE};
use url::{Position, Url};

use super::connection::{
    CloseEvent, ConnectionState, EventSink, Socket, Transport, TransportEvents,
    TungsteniteTransport,
};
use super::guard::ConnectionGuard;
use super::listener::Listener;
use super::reconnect::ReconnectScheduler;
use super::timer::{self, TimerHandle};
use crate::config::ClientConfig;
use crate::endpoint::{EndpointResolver, TokenProvider};
use crate::error::TransportError;

/// Client side of the system notification channel.
///
/// Dropping the manager disconnects it.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        config: ClientConfig,
        tokens: Arc<dyn TokenProvider>,
        transport: impl Transport,
        listener: Arc<dyn Listener>,
    ) -> Self {
        let resolver = EndpointResolver::new(&config, tokens);
        let shared = Arc::new_cyclic(|me| Shared {
            me: me.clone(),
            connect_timeout: config.connect_timeout,
            reconnect_delay: config.reconnect_delay,
            resolver,
            transport: Box::new(transport),
            listener,
            delivery: ReentrantMutex::new(()),
            inner: Mutex::new(Inner::default()),
        });
        Self { shared }
    }

    /// Manager backed by the tokio-tungstenite transport.
    pub fn with_tungstenite(
        config: ClientConfig,
        tokens: Arc<dyn TokenProvider>,
        listener: Arc<dyn Listener>,
    ) -> Self {
        Self::new(config, tokens, TungsteniteTransport, listener)
    }

    /// Start connecting. A no-op while an attempt is in flight, while open, or
    /// after [`disconnect`](Self::disconnect).
    pub fn connect(&self) {
        self.shared.connect();
    }

    /// Tear down permanently: cancel timers, close the socket with code 1000,
    /// and suppress every later callback. Idempotent.
    pub fn disconnect(&self) {
        self.shared.disconnect();
    }

    /// Send `{"message": payload}` if open. Returns whether a frame was handed
    /// to the transport; sending while not open is a silent no-op.
    pub fn send(&self, payload: &str) -> bool {
        self.shared.send(payload)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.inner.lock().guard.is_torn_down()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shared.disconnect();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("ConnectionManager")
            .field("state", &inner.state)
            .field("guard", &inner.guard)
            .field("attempt", &inner.attempt)
            .field("reconnect_pending", &inner.reconnect.is_pending())
            .finish()
    }
}

struct Shared {
    me: Weak<Shared>,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    resolver: EndpointResolver,
    transport: Box<dyn Transport>,
    listener: Arc<dyn Listener>,
    /// Held while callbacks run. Taken before `inner`, never after.
    delivery: ReentrantMutex<()>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    guard: ConnectionGuard,
    reconnect: ReconnectScheduler,
    connect_timer: Option<TimerHandle>,
    socket: Option<Box<dyn Socket>>,
    /// Id of the latest connect attempt; `socket` belongs to it.
    attempt: u64,
}

/// Callback deferred until the lock is released.
enum Notice {
    State(ConnectionState),
    Open,
    Message(SystemMessage),
    Close(CloseEvent),
    Error(TransportError),
}

impl Inner {
    fn owns(&self, attempt: u64) -> bool {
        self.socket.is_some() && self.attempt == attempt
    }

    fn set_state(&mut self, next: ConnectionState, notices: &mut Vec<Notice>) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            crate::log_warn!("Illegal transition {} -> {}, ignoring", self.state, next);
            return;
        }
        crate::log_debug!("Connection state {} -> {}", self.state, next);
        self.state = next;
        notices.push(Notice::State(next));
    }

    /// Whether `connect()` may start a new attempt right now.
    fn may_connect(&self) -> bool {
        if self.guard.is_torn_down() {
            crate::log_debug!("connect() after disconnect, ignoring");
            return false;
        }
        if self.guard.is_connecting()
            || self.state.is_connected()
            || !self.state.can_transition_to(ConnectionState::Connecting)
        {
            crate::log_debug!("connect() while {}, ignoring", self.state);
            return false;
        }
        true
    }

    fn cancel_connect_timer(&mut self) {
        if let Some(timer) = self.connect_timer.take() {
            timer.cancel();
        }
    }
}

/// Endpoint URL without the query, so tokens stay out of logs.
fn redact(url: &Url) -> &str {
    &url[..Position::AfterPath]
}

impl Shared {
    fn dispatch(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        let _delivering = self.delivery.lock();
        for notice in notices {
            // A callback earlier in this batch, or another thread, may have
            // torn the manager down.
            if self.inner.lock().guard.is_torn_down() {
                return;
            }
            match notice {
                Notice::State(state) => self.listener.on_state_change(state),
                Notice::Open => self.listener.on_open(),
                Notice::Message(message) => self.listener.on_message(message),
                Notice::Close(event) => self.listener.on_close(&event),
                Notice::Error(error) => self.listener.on_error(&error),
            }
        }
    }

    fn connect(&self) {
        if !self.inner.lock().may_connect() {
            return;
        }

        // The token provider may do I/O or call back into the manager, so it
        // runs outside the lock and the checks are repeated afterwards.
        let url = match self.resolver.resolve().and_then(|endpoint| endpoint.url()) {
            Ok(url) => url,
            Err(e) => {
                crate::log_error!("Cannot resolve notification endpoint: {}", e);
                self.dispatch(vec![Notice::Error(e)]);
                return;
            }
        };

        let mut notices = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !inner.may_connect() {
                return;
            }

            inner.guard.try_begin();
            inner.attempt += 1;
            let attempt = inner.attempt;
            inner.set_state(ConnectionState::Connecting, &mut notices);
            crate::log_info!("Connecting to {} (attempt {})", redact(&url), attempt);

            let sink: Weak<dyn EventSink> = self.me.clone();
            match self.transport.open(&url, TransportEvents::new(sink, attempt)) {
                Ok(socket) => {
                    inner.socket = Some(socket);
                    let me = self.me.clone();
                    let armed = timer::spawn_after(self.connect_timeout, move || {
                        if let Some(shared) = me.upgrade() {
                            shared.on_connect_timeout(attempt);
                        }
                    });
                    match armed {
                        Ok(handle) => inner.connect_timer = Some(handle),
                        Err(e) => crate::log_warn!("Connect timeout not armed: {}", e),
                    }
                }
                Err(e) => {
                    crate::log_error!("Failed to open socket to {}: {}", redact(&url), e);
                    inner.guard.finish();
                    inner.set_state(ConnectionState::Closed, &mut notices);
                    notices.push(Notice::Error(e));
                }
            }
        }
        self.dispatch(notices);
    }

    fn disconnect(&self) {
        // Waits for callbacks running on other threads; reentrant for a
        // listener disconnecting from inside its own callback.
        let _delivering = self.delivery.lock();
        let mut inner = self.inner.lock();
        if !inner.guard.tear_down() {
            return;
        }
        inner.reconnect.cancel();
        inner.cancel_connect_timer();
        if let Some(socket) = inner.socket.take() {
            inner.state = ConnectionState::Closing;
            socket.close(NORMAL_CLOSURE);
        }
        inner.state = ConnectionState::Closed;
        crate::log_info!("Notification channel disconnected");
    }

    fn send(&self, payload: &str) -> bool {
        let inner = self.inner.lock();
        if !inner.state.is_connected() {
            crate::log_debug!("send() while {}, dropping", inner.state);
            return false;
        }
        let Some(socket) = inner.socket.as_ref() else {
            return false;
        };
        let frame = match protocol::encode(payload) {
            Ok(frame) => frame,
            Err(e) => {
                crate::log_error!("Failed to encode outbound message: {}", e);
                return false;
            }
        };
        match socket.send_text(frame) {
            Ok(()) => true,
            Err(e) => {
                crate::log_warn!("Outbound message not sent: {}", e);
                false
            }
        }
    }

    fn on_connect_timeout(&self, attempt: u64) {
        let mut notices = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.attempt != attempt || !inner.state.is_connecting() {
                return;
            }
            if let Some(timer) = inner.connect_timer.take() {
                timer.detach();
            }
            if inner.guard.is_torn_down() {
                return;
            }

            crate::log_warn!(
                "Handshake timed out after {}ms (attempt {})",
                self.connect_timeout.as_millis(),
                attempt
            );
            // Taking the socket makes its eventual close event stale, so a
            // timeout never schedules a reconnect.
            if let Some(socket) = inner.socket.take() {
                inner.set_state(ConnectionState::Closing, &mut notices);
                socket.close(NORMAL_CLOSURE);
            }
            inner.guard.finish();
            inner.set_state(ConnectionState::Closed, &mut notices);
            notices.push(Notice::Error(TransportError::HandshakeTimeout(
                self.connect_timeout,
            )));
        }
        self.dispatch(notices);
    }

    fn run_reconnect(&self, generation: u64) {
        {
            let mut inner = self.inner.lock();
            if !inner.reconnect.fired(generation) {
                crate::log_debug!("Ignoring superseded reconnect timer ({})", generation);
                return;
            }
            if inner.guard.is_torn_down() {
                return;
            }
        }
        crate::log_info!("Reconnecting notification channel");
        self.connect();
    }
}

impl EventSink for Shared {
    fn on_transport_open(&self, attempt: u64) {
        let mut notices = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !inner.owns(attempt) {
                crate::log_debug!("Ignoring open from stale socket (attempt {})", attempt);
                return;
            }
            inner.cancel_connect_timer();

            if inner.guard.is_torn_down() {
                // Owner went away during the handshake
                if let Some(socket) = inner.socket.take() {
                    socket.close(NORMAL_CLOSURE);
                }
                inner.state = ConnectionState::Closed;
                return;
            }
            if !inner.state.is_connecting() {
                crate::log_warn!("Open while {}, ignoring", inner.state);
                return;
            }

            inner.guard.finish();
            inner.set_state(ConnectionState::Open, &mut notices);
            inner.reconnect.cancel();
            notices.push(Notice::Open);
            crate::log_info!("Notification channel open (attempt {})", attempt);
        }
        self.dispatch(notices);
    }

    fn on_transport_message(&self, attempt: u64, text: &str) {
        {
            let inner = self.inner.lock();
            if !inner.owns(attempt) || inner.guard.is_torn_down() {
                return;
            }
        }

        match protocol::decode(text) {
            Ok(message) => self.dispatch(vec![Notice::Message(message)]),
            Err(e) if e.is_unknown_envelope() => {
                crate::log_debug!("Ignoring frame: {}", e);
            }
            Err(e) => {
                crate::log_warn!("Dropping undecodable frame: {}", e);
            }
        }
    }

    fn on_transport_close(&self, attempt: u64, event: CloseEvent) {
        let mut notices = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !inner.owns(attempt) {
                crate::log_debug!("Ignoring close from stale socket (attempt {})", attempt);
                return;
            }
            inner.socket = None;
            inner.cancel_connect_timer();
            inner.guard.finish();

            if inner.guard.is_torn_down() {
                inner.state = ConnectionState::Closed;
                return;
            }

            inner.set_state(ConnectionState::Closed, &mut notices);

            if !event.is_normal() && !inner.reconnect.is_pending() {
                let me = self.me.clone();
                let scheduled = inner.reconnect.schedule(self.reconnect_delay, move |generation| {
                    if let Some(shared) = me.upgrade() {
                        shared.run_reconnect(generation);
                    }
                });
                match scheduled {
                    Ok(true) => crate::log_info!(
                        "Connection closed abnormally (code {}), reconnecting in {}ms",
                        event.code,
                        self.reconnect_delay.as_millis()
                    ),
                    Ok(false) => {}
                    Err(e) => crate::log_error!("Reconnect not scheduled: {}", e),
                }
            } else {
                crate::log_info!("Connection closed (code {})", event.code);
            }

            notices.push(Notice::Close(event));
        }
        self.dispatch(notices);
    }

    fn on_transport_error(&self, attempt: u64, error: TransportError) {
        {
            let inner = self.inner.lock();
            if !inner.owns(attempt) || inner.guard.is_torn_down() {
                return;
            }
        }
        crate::log_error!("Transport error (attempt {}): {}", attempt, error);
        self.dispatch(vec![Notice::Error(error)]);
    }
}
