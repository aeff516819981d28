//! [`OneShot`] – a cancellable single-shot timer.
//!
//! Built on `tokio::spawn` + `sleep` + task abort.  Re-arming is
//! cancel-then-reschedule: the previous callback is dropped unfired, so the
//! debounce and barrier layers get last-writer-wins semantics for free.

use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::sleep;

/// A single-shot timer slot.  Holds at most one armed timer at a time.
#[derive(Debug, Default)]
pub struct OneShot {
    handle: Option<AbortHandle>,
}

impl OneShot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer: run `callback` after `duration` unless cancelled.
    ///
    /// Any previously armed timer is cancelled first.
    pub fn schedule<F>(&mut self, duration: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let task = tokio::spawn(async move {
            sleep(duration).await;
            callback();
        });
        self.handle = Some(task.abort_handle());
    }

    /// Cancel the armed timer, if any.  Idempotent.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// `true` while a scheduled callback has neither fired nor been cancelled.
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for OneShot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn fires_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = OneShot::new();
        timer.schedule(Duration::from_millis(100), move || {
            let _ = tx.send("fired");
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(rx.try_recv().ok(), Some("fired"));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel::<&str>();
        let mut timer = OneShot::new();
        timer.schedule(Duration::from_millis(100), move || {
            let _ = tx.send("fired");
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_drops_the_previous_callback() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tx2 = tx.clone();
        let mut timer = OneShot::new();
        timer.schedule(Duration::from_millis(100), move || {
            let _ = tx.send("first");
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        timer.schedule(Duration::from_millis(100), move || {
            let _ = tx2.send("second");
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.try_recv().ok(), Some("second"));
        assert!(rx.try_recv().is_err());
    }
}
