//! Scheduled tasks
//!
//! A [`ScheduledTask`] runs an action once after a delay unless it is
//! cancelled first. It can also be flushed, which runs the action immediately
//! instead of waiting. Dropping the task cancels it.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{runtime::Handle, task::JoinHandle};

type Action = Box<dyn FnOnce() + Send>;

type Slot = Arc<Mutex<Option<Action>>>;

/// A cancellable delayed action.
pub struct ScheduledTask {
    slot: Slot,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Schedules `action` to run after `delay` on the current tokio runtime.
    ///
    /// Outside a runtime there is nothing to defer onto, so the action runs
    /// immediately and the returned task is already finished.
    pub fn schedule(delay: Duration, action: impl FnOnce() + Send + 'static) -> Self {
        let slot: Slot = Arc::new(Mutex::new(Some(Box::new(action))));

        let handle = if let Ok(runtime) = Handle::try_current() {
            let pending = Arc::clone(&slot);

            Some(runtime.spawn(async move {
                tokio::time::sleep(delay).await;

                if let Some(action) = take(&pending) {
                    action();
                }
            }))
        } else {
            if let Some(action) = take(&slot) {
                action();
            }

            None
        };

        Self { slot, handle }
    }

    /// Whether the action has neither run nor been cancelled.
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Runs the action now if it has not run yet. Returns whether it ran.
    pub fn flush(mut self) -> bool {
        self.abort();

        match take(&self.slot) {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    /// Drops the action without running it. Returns whether it was pending.
    pub fn cancel(mut self) -> bool {
        self.abort();

        take(&self.slot).is_some()
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.abort();
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

fn take(slot: &Slot) -> Option<Action> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}
