//! Client configuration from environment variables.

use std::time::Duration;

use url::Url;

/// Handshake must complete within this window.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
/// Fixed delay before retrying after an abnormal close.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(10000);

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PATH: &str = "/ws/notifications/";

/// One possible location of the notification endpoint.
///
/// A candidate is only usable when it names a host; candidates are tried in
/// order and the first usable one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCandidate {
    pub host: Option<String>,
    pub port: u16,
    pub path: String,
}

impl EndpointCandidate {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            port,
            path: path.into(),
        }
    }

    /// The built-in fallback: `localhost:8000/ws/notifications/`.
    pub fn fallback() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_PATH)
    }

    pub fn is_usable(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.trim().is_empty())
    }
}

/// Configuration for a [`ConnectionManager`](crate::ws::ConnectionManager).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the hosting page. An `https` origin selects `wss`.
    pub page_origin: Option<Url>,
    /// Ordered endpoint candidates, first usable one wins.
    pub candidates: Vec<EndpointCandidate>,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_origin: None,
            candidates: vec![EndpointCandidate::fallback()],
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ClientConfig {
    /// Build configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SYSNOTIFY_PAGE_ORIGIN`: origin of the hosting page (e.g. "https://app.example.com")
    /// - `SYSNOTIFY_WS_HOST`: explicit endpoint host (preferred candidate when set)
    /// - `SYSNOTIFY_WS_PORT`: explicit endpoint port (default: 8000)
    /// - `SYSNOTIFY_WS_PATH`: endpoint path (default: "/ws/notifications/")
    /// - `SYSNOTIFY_CONNECT_TIMEOUT_MS`: handshake timeout (default: 5000)
    /// - `SYSNOTIFY_RECONNECT_DELAY_MS`: reconnect delay (default: 10000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let page_origin = var("SYSNOTIFY_PAGE_ORIGIN").and_then(|raw| match Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(e) => {
                crate::log_warn!("Ignoring SYSNOTIFY_PAGE_ORIGIN '{}': {}", raw, e);
                None
            }
        });

        let path = var("SYSNOTIFY_WS_PATH").unwrap_or_else(|| DEFAULT_PATH.to_string());
        let port = var("SYSNOTIFY_WS_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let mut candidates = Vec::new();
        if let Some(host) = var("SYSNOTIFY_WS_HOST") {
            candidates.push(EndpointCandidate::new(host, port, path.clone()));
        }
        if let Some(origin) = page_origin.as_ref() {
            candidates.push(EndpointCandidate {
                host: origin.host_str().map(str::to_string),
                port: origin.port().unwrap_or(port),
                path: path.clone(),
            });
        }
        candidates.push(EndpointCandidate::new(DEFAULT_HOST, port, path));

        let millis = |key: &str, default: Duration| {
            var(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            page_origin,
            candidates,
            connect_timeout: millis("SYSNOTIFY_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT),
            reconnect_delay: millis("SYSNOTIFY_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY),
        }
    }

    pub fn with_page_origin(mut self, origin: Url) -> Self {
        self.page_origin = Some(origin);
        self
    }

    /// Replace the candidate list.
    pub fn with_candidates(mut self, candidates: Vec<EndpointCandidate>) -> Self {
        self.candidates = candidates;
        self
    }
}
