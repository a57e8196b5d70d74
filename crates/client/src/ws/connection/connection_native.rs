//! Native WebSocket transport using tokio-tungstenite.

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use sysnotify_shared::{ABNORMAL_CLOSURE, NO_STATUS_RECEIVED};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{Socket, Transport, TransportEvents};
use crate::error::TransportError;

/// Opens sockets on the current tokio runtime, one task per socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

enum Outbound {
    Text(String),
    Close(u16),
}

struct TungsteniteSocket {
    sender: UnboundedSender<Outbound>,
}

impl Socket for TungsteniteSocket {
    fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.sender
            .unbounded_send(Outbound::Text(text))
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn close(&self, code: u16) {
        // The task may already have exited.
        let _ = self.sender.unbounded_send(Outbound::Close(code));
    }
}

impl Transport for TungsteniteTransport {
    fn open(&self, url: &Url, events: TransportEvents) -> Result<Box<dyn Socket>, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::NoRuntime(e.to_string()))?;

        let (sender, receiver) = unbounded();
        runtime.spawn(run_socket(url.to_string(), receiver, events));

        Ok(Box::new(TungsteniteSocket { sender }))
    }
}

/// Drive one socket from handshake to close, reporting through `events`.
async fn run_socket(url: String, mut outbound: UnboundedReceiver<Outbound>, events: TransportEvents) {
    let attempt = events.attempt();

    let connect = connect_async(url);
    tokio::pin!(connect);

    // Handshake, abandoned if the owner closes or drops the socket first
    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((ws_stream, _response)) => break ws_stream,
                Err(e) => {
                    crate::log_error!("WebSocket handshake failed (attempt {}): {}", attempt, e);
                    events.error(TransportError::Connect(e.to_string()));
                    events.closed(ABNORMAL_CLOSURE, "");
                    return;
                }
            },
            cmd = outbound.next() => match cmd {
                Some(Outbound::Close(_)) => {
                    crate::log_debug!("Socket closed during handshake (attempt {})", attempt);
                    events.closed(ABNORMAL_CLOSURE, "closed before handshake completed");
                    return;
                }
                Some(Outbound::Text(_)) => {
                    crate::log_debug!("Dropping frame queued before handshake (attempt {})", attempt);
                }
                None => return,
            },
        }
    };

    events.opened();
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => events.message(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                    crate::log_info!("Server closed socket (attempt {}): code {}", attempt, code);
                    events.closed(code, &reason);
                    return;
                }
                Some(Ok(_)) => {
                    // Binary, ping, pong: pongs are handled by tungstenite
                }
                Some(Err(e)) => {
                    crate::log_error!("WebSocket read error (attempt {}): {}", attempt, e);
                    events.error(TransportError::Protocol(e.to_string()));
                    events.closed(ABNORMAL_CLOSURE, "");
                    return;
                }
                None => {
                    events.closed(ABNORMAL_CLOSURE, "");
                    return;
                }
            },
            cmd = outbound.next() => match cmd {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::text(text)).await {
                        crate::log_error!("WebSocket send failed (attempt {}): {}", attempt, e);
                        events.error(TransportError::Protocol(e.to_string()));
                        events.closed(ABNORMAL_CLOSURE, "");
                        return;
                    }
                }
                Some(Outbound::Close(code)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "".into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        crate::log_debug!("Close frame not delivered (attempt {}): {}", attempt, e);
                    }
                    events.closed(code, "");
                    return;
                }
                None => {
                    // Owner dropped the socket without closing it
                    let _ = write.close().await;
                    return;
                }
            },
        }
    }
}
