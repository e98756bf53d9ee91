//! Trailing debounce for snapshot notifications.
//!
//! Every [`touch`](Debouncer::touch) pushes the deadline out by one window;
//! [`ready`](Debouncer::ready) resolves once the window passes without a
//! touch. The debouncer only decides *when* to notify. Records are never
//! held back by it, since they are merged into the result set immediately.
//!
//! One debouncer belongs to one search attempt and is dropped with it, so a
//! cancelled attempt can never fire a late notification.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Note new activity; restarts the window.
    pub fn touch(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Clear a pending notification. Returns whether one was pending.
    pub fn flush(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Resolve when a pending window elapses; never resolves when idle.
    ///
    /// Cancel-safe: dropping the future keeps the pending deadline.
    pub async fn ready(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
