//! Sysnotify - command-line listener for the system notification channel.
//!
//! Prints every received system message as one JSON line on stdout and sends
//! each stdin line as an outbound message. Configuration comes from the
//! `SYSNOTIFY_*` environment variables (see `ClientConfig::from_env`); the
//! bearer token from `SYSNOTIFY_TOKEN`, falling back to the stored session.

use std::sync::Arc;

use anyhow::Context;
use futures_util::StreamExt;
use sysnotify_client::{
    ChannelListener, ClientConfig, ConnectionManager, NotificationEvent, SessionTokenProvider,
    StaticToken, TokenProvider, TransportError,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

/// Default `RUST_LOG`; the client logs under the `sysnotify::ws` target.
const DEFAULT_LOG_FILTER: &str = "sysnotify=info,sysnotify::ws=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env();
    let retry_delay = config.reconnect_delay;

    let tokens: Arc<dyn TokenProvider> = match std::env::var("SYSNOTIFY_TOKEN") {
        Ok(token) if !token.is_empty() => Arc::new(StaticToken::new(token)),
        _ => Arc::new(SessionTokenProvider::default()),
    };

    let (listener, mut events) = ChannelListener::new();
    let manager = ConnectionManager::with_tungstenite(config, tokens, Arc::new(listener));
    manager.connect();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    // The manager does not retry a timed-out handshake; this loop does.
    let retry = tokio::time::sleep(retry_delay);
    tokio::pin!(retry);
    let mut retry_armed = false;

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(NotificationEvent::Message(message)) => {
                    let line = serde_json::to_string(&message).context("Failed to encode message")?;
                    println!("{line}");
                }
                Some(NotificationEvent::Error(TransportError::HandshakeTimeout(after))) => {
                    tracing::warn!(?after, "handshake timed out, retrying in {:?}", retry_delay);
                    retry.as_mut().reset(Instant::now() + retry_delay);
                    retry_armed = true;
                }
                Some(NotificationEvent::Error(error)) => {
                    tracing::warn!(%error, "notification channel error");
                }
                Some(NotificationEvent::StateChanged(state)) => {
                    tracing::info!(%state, "notification channel state");
                }
                Some(NotificationEvent::Opened | NotificationEvent::Closed(_)) => {}
                None => break,
            },
            () = &mut retry, if retry_armed => {
                retry_armed = false;
                manager.connect();
            }
            line = stdin.next_line(), if stdin_open => match line.context("Failed to read stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if !manager.send(&line) {
                        tracing::warn!(state = %manager.state(), "not connected, message dropped");
                    }
                }
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    manager.disconnect();
    Ok(())
}
