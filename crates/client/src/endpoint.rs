//! Endpoint resolution for the notification socket.
//!
//! Pure configuration assembly: picks the first usable candidate, derives the
//! scheme from the hosting page, and attaches the bearer token when one is
//! available. Re-run on every connect attempt so rotated tokens are picked up.

use std::sync::Arc;

use url::Url;

use crate::config::{ClientConfig, EndpointCandidate};
use crate::error::TransportError;

/// WebSocket scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Ws,
    Wss,
}

impl Scheme {
    /// `wss` iff the hosting page is served over `https`.
    pub fn for_page(origin: Option<&Url>) -> Self {
        match origin {
            Some(url) if url.scheme() == "https" => Scheme::Wss,
            _ => Scheme::Ws,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

/// A fully resolved endpoint for one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub auth_token: Option<String>,
}

impl EndpointConfig {
    /// `<ws|wss>://<host>:<port><path>[?token=<token>]`
    pub fn url(&self) -> Result<Url, TransportError> {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let raw = format!("{}://{}:{}{}", self.scheme.as_str(), self.host, self.port, path);
        let mut url = Url::parse(&raw).map_err(|e| TransportError::InvalidEndpoint(format!("{raw}: {e}")))?;

        if let Some(token) = self.auth_token.as_deref() {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

/// Access to the caller's authentication state.
///
/// The client never acquires or refreshes tokens itself; it only asks for the
/// current one right before each connect attempt.
pub trait TokenProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn token(&self) -> Option<String>;
}

/// A fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn is_authenticated(&self) -> bool {
        self.0.as_deref().is_some_and(|t| !t.is_empty())
    }

    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Closures returning the current token act as providers; a non-empty token
/// counts as authenticated.
impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn is_authenticated(&self) -> bool {
        self().is_some_and(|t| !t.is_empty())
    }

    fn token(&self) -> Option<String> {
        self()
    }
}

/// Builds an [`EndpointConfig`] from configuration and the token provider.
#[derive(Clone)]
pub struct EndpointResolver {
    page_origin: Option<Url>,
    candidates: Vec<EndpointCandidate>,
    tokens: Arc<dyn TokenProvider>,
}

impl EndpointResolver {
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            page_origin: config.page_origin.clone(),
            candidates: config.candidates.clone(),
            tokens,
        }
    }

    /// Resolve the endpoint for the next connect attempt.
    pub fn resolve(&self) -> Result<EndpointConfig, TransportError> {
        let candidate = self
            .candidates
            .iter()
            .find(|c| c.is_usable())
            .ok_or_else(|| TransportError::InvalidEndpoint("no usable endpoint candidate".to_string()))?;

        let auth_token = if self.tokens.is_authenticated() {
            self.tokens.token().filter(|t| !t.is_empty())
        } else {
            None
        };

        Ok(EndpointConfig {
            scheme: Scheme::for_page(self.page_origin.as_ref()),
            host: candidate.host.clone().unwrap_or_default(),
            port: candidate.port,
            path: candidate.path.clone(),
            auth_token,
        })
    }
}

impl std::fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("page_origin", &self.page_origin)
            .field("candidates", &self.candidates)
            .finish_non_exhaustive()
    }
}
