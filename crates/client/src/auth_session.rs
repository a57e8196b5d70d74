//! Persisted authentication session and the token provider backed by it.

use serde::{Deserialize, Serialize};

use crate::endpoint::TokenProvider;
use crate::storage::Storage;

pub const STORAGE_KEY: &str = "sysnotify_session";

/// Stored session data, written by whatever part of the application logs in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub user_id: String,
    pub access_token: String,
}

/// Reads the current session from storage on every call, so a token rotated
/// by another part of the application is used on the next connect attempt.
#[derive(Debug, Clone, Default)]
pub struct SessionTokenProvider {
    storage: Storage,
}

impl SessionTokenProvider {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.storage.load(STORAGE_KEY)
    }

    /// Store a new session (login or token refresh).
    pub fn login(&self, user_id: impl Into<String>, access_token: impl Into<String>) -> bool {
        self.storage.save(
            STORAGE_KEY,
            &AuthSession {
                user_id: user_id.into(),
                access_token: access_token.into(),
            },
        )
    }

    pub fn logout(&self) {
        self.storage.remove(STORAGE_KEY);
    }
}

impl TokenProvider for SessionTokenProvider {
    fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    fn token(&self) -> Option<String> {
        self.session()
            .map(|s| s.access_token)
            .filter(|t| !t.is_empty())
    }
}
