//! Single-shot, cancelable reconnect timer.

use std::time::Duration;

use super::timer::{self, TimerHandle};
use crate::error::TransportError;

/// Holds at most one pending reconnect. Overlapping close events cannot stack
/// timers: scheduling while one is pending is a no-op.
///
/// Each timer carries a generation. A cancelled timer whose callback was
/// already running reports a stale generation and leaves the slot alone.
#[derive(Debug, Default)]
pub struct ReconnectScheduler {
    pending: Option<(u64, TimerHandle)>,
    generation: u64,
}

impl ReconnectScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. Returns `Ok(false)` if one is already pending.
    ///
    /// `f` receives the timer's generation, to hand back to [`fired`](Self::fired).
    pub fn schedule<F>(&mut self, delay: Duration, f: F) -> Result<bool, TransportError>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        if self.is_pending() {
            return Ok(false);
        }
        let generation = self.generation + 1;
        let handle = timer::spawn_after(delay, move || f(generation))?;
        self.generation = generation;
        self.pending = Some((generation, handle));
        Ok(true)
    }

    /// Cancel the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.is_pending();
        if let Some((_, handle)) = self.pending.take() {
            handle.cancel();
        }
        was_pending
    }

    /// Clear the slot from inside the timer's own callback. Returns `false`
    /// when `generation` is not the pending timer's, i.e. the caller was
    /// cancelled or replaced and should do nothing.
    pub fn fired(&mut self, generation: u64) -> bool {
        match self.pending.take() {
            Some((current, handle)) if current == generation => {
                handle.detach();
                true
            }
            other => {
                self.pending = other;
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|(_, h)| !h.is_finished())
    }
}
