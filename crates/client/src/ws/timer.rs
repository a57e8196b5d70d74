//! Cancelable single-shot timers on the tokio runtime.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::TransportError;

/// A pending timer. Dropping or cancelling it stops the callback from running.
#[derive(Debug)]
pub struct TimerHandle {
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Forget the handle without cancelling, used from inside the timer's own callback.
    pub fn detach(mut self) {
        self.task.take();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Run `f` once after `delay` on the current tokio runtime.
pub fn spawn_after<F>(delay: Duration, f: F) -> Result<TimerHandle, TransportError>
where
    F: FnOnce() + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| TransportError::NoRuntime(e.to_string()))?;

    let task = runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        f();
    });

    Ok(TimerHandle { task: Some(task) })
}
