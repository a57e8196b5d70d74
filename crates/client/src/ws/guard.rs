//! Guard against duplicate sockets and post-teardown callbacks.

/// Tracks whether a connect attempt is in flight and whether the owner has
/// been torn down. Teardown is permanent: once set, no further connect or
/// reconnect may happen for the owning manager.
#[derive(Debug, Default)]
pub struct ConnectionGuard {
    connecting: bool,
    torn_down: bool,
}

impl ConnectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the in-flight slot. Fails if an attempt is already running or the
    /// guard is torn down.
    pub fn try_begin(&mut self) -> bool {
        if self.torn_down || self.connecting {
            return false;
        }
        self.connecting = true;
        true
    }

    /// Release the in-flight slot (handshake finished, failed or timed out).
    pub fn finish(&mut self) {
        self.connecting = false;
    }

    /// Mark the owner torn down. Returns `true` only on the first call.
    pub fn tear_down(&mut self) -> bool {
        self.connecting = false;
        !std::mem::replace(&mut self.torn_down, true)
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
