//! Lifecycle tests for the connection manager, driven through a mock transport
//! on a paused tokio clock.

mod common;

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use common::{MockTransport, Recorder};
use parking_lot::Mutex;
use sysnotify_client::{
    ClientConfig, CloseEvent, ConnectionManager, ConnectionState, Listener, MessageType,
    StaticToken, SystemMessage, TokenProvider, TransportError,
};

const HELLO: &str = r#"{"type":"system_message","message":{"id":"1","recipient_id":"u1","message":"hello","message_type":"info","is_read":false,"created_at":"2024-01-01T00:00:00Z"}}"#;

fn setup_with(tokens: Arc<dyn TokenProvider>) -> (ConnectionManager, MockTransport, Arc<Recorder>) {
    let transport = MockTransport::default();
    let recorder = Arc::new(Recorder::default());
    let manager = ConnectionManager::new(
        ClientConfig::default(),
        tokens,
        transport.clone(),
        recorder.clone(),
    );
    (manager, transport, recorder)
}

fn setup() -> (ConnectionManager, MockTransport, Arc<Recorder>) {
    setup_with(Arc::new(StaticToken::new("t1")))
}

async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

// =============================================================================
// connect()
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_twice_creates_one_transport() {
    let (manager, transport, _recorder) = setup();

    manager.connect();
    manager.connect();
    assert_eq!(transport.opened(), 1);
    assert_eq!(manager.state(), ConnectionState::Connecting);

    transport.last().events.opened();
    manager.connect();
    assert_eq!(transport.opened(), 1);
    assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_disconnect_is_ignored() {
    let (manager, transport, recorder) = setup();

    manager.disconnect();
    manager.connect();
    assert_eq!(transport.opened(), 0);
    assert!(manager.is_torn_down());
    assert!(recorder.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_open_failure_reports_error_without_retry() {
    let (manager, transport, recorder) = setup();
    transport.fail_next_open(TransportError::Connect("boom".to_string()));

    manager.connect();
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(
        recorder.errors(),
        vec![TransportError::Connect("boom".to_string())]
    );

    advance(30_000).await;
    assert_eq!(transport.opened(), 0);

    // Guard was released, so an explicit retry goes through
    manager.connect();
    assert_eq!(transport.opened(), 1);
}

// =============================================================================
// Teardown races
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_open_after_disconnect_closes_socket_without_callback() {
    let (manager, transport, recorder) = setup();

    manager.connect();
    let socket = transport.last();
    manager.disconnect();
    assert_eq!(socket.closed_with(), Some(1000));

    socket.events.opened();
    assert_eq!(recorder.opens(), 0);
    assert_eq!(manager.state(), ConnectionState::Closed);

    // The handshake timer was cancelled along with everything else
    advance(30_000).await;
    assert!(recorder.errors().is_empty());
    assert_eq!(transport.opened(), 1);
    assert_eq!(recorder.states(), vec![ConnectionState::Connecting]);
}

#[tokio::test(start_paused = true)]
async fn test_no_callbacks_after_disconnect() {
    let (manager, transport, recorder) = setup();

    manager.connect();
    let socket = transport.last();
    socket.events.opened();
    let before = recorder.events().len();

    manager.disconnect();
    manager.disconnect();
    socket.events.message(HELLO);
    socket.events.error(TransportError::Protocol("reset".to_string()));
    socket.events.closed(1006, "");

    advance(30_000).await;
    assert_eq!(recorder.events().len(), before);
    assert_eq!(transport.opened(), 1);
    assert!(!manager.send("x"));
    assert!(socket.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_manager_tears_down() {
    let (manager, transport, recorder) = setup();

    manager.connect();
    let socket = transport.last();
    socket.events.opened();
    socket.events.closed(1006, "");
    drop(manager);

    socket.events.opened();
    advance(30_000).await;
    assert_eq!(transport.opened(), 1);
    assert_eq!(recorder.opens(), 1);
}

// =============================================================================
// Close handling and reconnection
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_normal_close_does_not_reconnect() {
    let (manager, transport, recorder) = setup();

    manager.connect();
    let socket = transport.last();
    socket.events.opened();
    socket.events.closed(1000, "");

    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(recorder.closes(), vec![CloseEvent::new(1000, "")]);

    advance(30_000).await;
    assert_eq!(transport.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_reconnects_once_after_delay() {
    let (manager, transport, recorder) = setup();

    manager.connect();
    let first = transport.last();
    first.events.opened();
    first.events.closed(1006, "");
    // Duplicate close from the same socket is stale
    first.events.closed(1006, "");
    assert_eq!(recorder.closes().len(), 1);

    advance(9_900).await;
    assert_eq!(transport.opened(), 1);

    advance(200).await;
    assert_eq!(transport.opened(), 2);
    assert_eq!(manager.state(), ConnectionState::Connecting);

    transport.last().events.opened();
    assert!(manager.is_connected());
    assert_eq!(recorder.opens(), 2);

    advance(60_000).await;
    assert_eq!(transport.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refused_connection_reconnects() {
    let (manager, transport, recorder) = setup();

    manager.connect();
    let socket = transport.last();
    socket
        .events
        .error(TransportError::Connect("refused".to_string()));
    // An error alone does not move the state machine
    assert_eq!(manager.state(), ConnectionState::Connecting);

    socket.events.closed(1006, "");
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(
        recorder.errors(),
        vec![TransportError::Connect("refused".to_string())]
    );

    advance(10_100).await;
    assert_eq!(transport.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_uses_fresh_token() {
    let current = Arc::new(Mutex::new(Some("t1".to_string())));
    let source = current.clone();
    let tokens: Arc<dyn TokenProvider> = Arc::new(move || source.lock().clone());
    let (manager, transport, _recorder) = setup_with(tokens);

    manager.connect();
    let first = transport.last();
    assert_eq!(first.url.query(), Some("token=t1"));
    first.events.opened();

    *current.lock() = Some("t2".to_string());
    first.events.closed(1011, "server error");
    advance(10_100).await;

    assert_eq!(transport.opened(), 2);
    assert_eq!(transport.last().url.query(), Some("token=t2"));
}

// =============================================================================
// Handshake timeout
// =============================================================================

// A timed-out handshake is a failed attempt: no automatic reconnect, only an
// explicit connect() retries.
#[tokio::test(start_paused = true)]
async fn test_handshake_timeout_does_not_reconnect() {
    let (manager, transport, recorder) = setup();

    manager.connect();
    let socket = transport.last();

    advance(4_900).await;
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert!(recorder.errors().is_empty());

    advance(200).await;
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(socket.closed_with(), Some(1000));
    assert_eq!(
        recorder.errors(),
        vec![TransportError::HandshakeTimeout(Duration::from_millis(5000))]
    );
    assert!(recorder.closes().is_empty());

    // The force-closed socket's own close event is stale
    socket.events.closed(1006, "");
    advance(30_000).await;
    assert_eq!(transport.opened(), 1);
    assert!(recorder.closes().is_empty());

    manager.connect();
    assert_eq!(transport.opened(), 2);

    // A late open from the abandoned socket is ignored
    socket.events.opened();
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert_eq!(recorder.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_open_cancels_handshake_timeout() {
    let (manager, transport, recorder) = setup();

    manager.connect();
    transport.last().events.opened();

    advance(30_000).await;
    assert!(manager.is_connected());
    assert!(recorder.errors().is_empty());
}

// =============================================================================
// Messages and send()
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_bad_frames_are_ignored() {
    let (manager, transport, recorder) = setup();

    manager.connect();
    let socket = transport.last();
    socket.events.opened();

    socket.events.message("{not json");
    socket.events.message(r#"{"type":"other","message":{}}"#);
    socket.events.message(r#"{"type":"system_message","message":{"id":"1"}}"#);

    assert!(manager.is_connected());
    assert!(recorder.messages().is_empty());
    assert!(recorder.errors().is_empty());

    socket.events.message(HELLO);
    assert_eq!(recorder.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_only_while_open() {
    let (manager, transport, _recorder) = setup();

    assert!(!manager.send("x"));

    manager.connect();
    let socket = transport.last();
    assert!(!manager.send("x"));
    assert!(socket.sent().is_empty());

    socket.events.opened();
    assert!(manager.send("x"));
    assert_eq!(socket.sent(), vec![r#"{"message":"x"}"#.to_string()]);

    socket.events.closed(1000, "");
    assert!(!manager.send("y"));
    assert_eq!(socket.sent().len(), 1);
}

/// Listener that sends a greeting from inside `on_open`.
#[derive(Default)]
struct Greeter {
    manager: OnceLock<Weak<ConnectionManager>>,
    greeted: Mutex<bool>,
}

impl Listener for Greeter {
    fn on_open(&self) {
        if let Some(manager) = self.manager.get().and_then(Weak::upgrade) {
            *self.greeted.lock() = manager.send("hello");
        }
    }

    fn on_message(&self, _message: SystemMessage) {}
}

#[tokio::test(start_paused = true)]
async fn test_listener_may_call_back_into_manager() {
    let transport = MockTransport::default();
    let greeter = Arc::new(Greeter::default());
    let manager = Arc::new(ConnectionManager::new(
        ClientConfig::default(),
        Arc::new(StaticToken::anonymous()),
        transport.clone(),
        greeter.clone(),
    ));
    greeter.manager.set(Arc::downgrade(&manager)).unwrap();

    manager.connect();
    let socket = transport.last();
    assert_eq!(socket.url.query(), None);
    socket.events.opened();

    assert!(*greeter.greeted.lock());
    assert_eq!(socket.sent(), vec![r#"{"message":"hello"}"#.to_string()]);
}

/// Records callbacks and disconnects the manager once `trigger` is reported.
struct DisconnectOn {
    trigger: ConnectionState,
    manager: OnceLock<Weak<ConnectionManager>>,
    recorder: Recorder,
}

impl DisconnectOn {
    fn install(trigger: ConnectionState) -> (Arc<ConnectionManager>, MockTransport, Arc<Self>) {
        let transport = MockTransport::default();
        let listener = Arc::new(Self {
            trigger,
            manager: OnceLock::new(),
            recorder: Recorder::default(),
        });
        let manager = Arc::new(ConnectionManager::new(
            ClientConfig::default(),
            Arc::new(StaticToken::new("t1")),
            transport.clone(),
            listener.clone(),
        ));
        listener.manager.set(Arc::downgrade(&manager)).unwrap();
        (manager, transport, listener)
    }
}

impl Listener for DisconnectOn {
    fn on_open(&self) {
        self.recorder.on_open();
    }

    fn on_message(&self, message: SystemMessage) {
        self.recorder.on_message(message);
    }

    fn on_close(&self, event: &CloseEvent) {
        self.recorder.on_close(event);
    }

    fn on_error(&self, error: &TransportError) {
        self.recorder.on_error(error);
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.recorder.on_state_change(state);
        if state == self.trigger {
            if let Some(manager) = self.manager.get().and_then(Weak::upgrade) {
                manager.disconnect();
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_from_state_callback_suppresses_open() {
    let (manager, transport, listener) = DisconnectOn::install(ConnectionState::Open);

    manager.connect();
    let socket = transport.last();
    socket.events.opened();

    assert!(manager.is_torn_down());
    assert_eq!(socket.closed_with(), Some(1000));
    assert_eq!(listener.recorder.opens(), 0);
    assert_eq!(
        listener.recorder.states(),
        vec![ConnectionState::Connecting, ConnectionState::Open]
    );
    assert!(!manager.send("x"));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_from_state_callback_suppresses_close_and_retry() {
    let (manager, transport, listener) = DisconnectOn::install(ConnectionState::Closed);

    manager.connect();
    let socket = transport.last();
    socket.events.opened();
    socket.events.closed(1006, "gone");

    assert!(manager.is_torn_down());
    assert!(listener.recorder.closes().is_empty());
    let before = listener.recorder.events().len();

    // The reconnect armed by the abnormal close was cancelled by disconnect()
    advance(30_000).await;
    assert_eq!(transport.opened(), 1);
    assert_eq!(listener.recorder.events().len(), before);
}

/// Token provider that consults the manager, then tears it down.
#[derive(Default)]
struct TearDownWhileResolving {
    manager: OnceLock<Weak<ConnectionManager>>,
}

impl TokenProvider for TearDownWhileResolving {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn token(&self) -> Option<String> {
        if let Some(manager) = self.manager.get().and_then(Weak::upgrade) {
            assert_eq!(manager.state(), ConnectionState::Idle);
            manager.disconnect();
        }
        Some("t1".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn test_token_provider_runs_outside_state_lock() {
    let transport = MockTransport::default();
    let recorder = Arc::new(Recorder::default());
    let tokens = Arc::new(TearDownWhileResolving::default());
    let manager = Arc::new(ConnectionManager::new(
        ClientConfig::default(),
        tokens.clone(),
        transport.clone(),
        recorder.clone(),
    ));
    tokens.manager.set(Arc::downgrade(&manager)).unwrap();

    manager.connect();

    // Disconnected while the token was being read, so no attempt starts
    assert_eq!(transport.opened(), 0);
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(recorder.events().is_empty());
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_lifecycle() {
    let (manager, transport, recorder) = setup();
    assert_eq!(manager.state(), ConnectionState::Idle);

    manager.connect();
    assert_eq!(manager.state(), ConnectionState::Connecting);
    let socket = transport.last();
    assert!(socket.url.as_str().ends_with("?token=t1"));

    socket.events.opened();
    assert_eq!(manager.state(), ConnectionState::Open);
    assert_eq!(recorder.opens(), 1);

    socket.events.message(HELLO);
    let messages = recorder.messages();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.id, "1");
    assert_eq!(message.recipient_id, "u1");
    assert_eq!(message.message, "hello");
    assert_eq!(message.message_type, MessageType::Info);
    assert!(!message.is_read);

    socket.events.closed(1006, "");
    assert_eq!(recorder.closes(), vec![CloseEvent::new(1006, "")]);
    assert_eq!(manager.state(), ConnectionState::Closed);

    advance(5_000).await;
    manager.disconnect();

    advance(30_000).await;
    assert_eq!(transport.opened(), 1);
    assert_eq!(recorder.opens(), 1);
    assert_eq!(
        recorder.states(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closed,
        ]
    );
}
