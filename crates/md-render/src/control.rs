use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProgress {
    pub current: usize,
    pub total: usize,
    /// 0.0..=1.0
    pub progress: f64,
    pub is_rendering: bool,
}

#[derive(Debug, Default)]
struct ControlState {
    paused: AtomicBool,
    stopped: AtomicBool,
    rendering: AtomicBool,
    current: AtomicUsize,
    total: AtomicUsize,
    wake: Notify,
}

/// Pause, resume and stop a running session from anywhere, including
/// another task. Clones share the same session.
#[derive(Debug, Clone, Default)]
pub struct RenderControl {
    state: Arc<ControlState>,
}

impl RenderControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.state.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.state.paused.store(false, Ordering::SeqCst);
        self.state.wake.notify_waiters();
    }

    /// Drop the rest of the session. Counters go back to zero.
    pub fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        self.state.paused.store(false, Ordering::SeqCst);
        self.state.rendering.store(false, Ordering::SeqCst);
        self.state.current.store(0, Ordering::SeqCst);
        self.state.total.store(0, Ordering::SeqCst);
        self.state.wake.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }

    pub fn is_rendering(&self) -> bool {
        self.state.rendering.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> RenderProgress {
        let current = self.state.current.load(Ordering::SeqCst);
        let total = self.state.total.load(Ordering::SeqCst);
        RenderProgress {
            current,
            total,
            progress: if total > 0 {
                current as f64 / total as f64
            } else {
                0.0
            },
            is_rendering: self.is_rendering(),
        }
    }

    /// Resolves immediately unless paused; otherwise when resumed or stopped.
    pub async fn wait_while_paused(&self) {
        loop {
            let woken = self.state.wake.notified();
            if !self.is_paused() || self.is_stopped() {
                return;
            }
            woken.await;
        }
    }

    pub(crate) fn begin(&self, total: usize) {
        self.state.stopped.store(false, Ordering::SeqCst);
        self.state.rendering.store(true, Ordering::SeqCst);
        self.state.current.store(0, Ordering::SeqCst);
        self.state.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn set_total(&self, total: usize) {
        if !self.is_stopped() {
            self.state.total.store(total, Ordering::SeqCst);
        }
    }

    pub(crate) fn advance(&self, current: usize) {
        if !self.is_stopped() {
            self.state.current.store(current, Ordering::SeqCst);
        }
    }

    pub(crate) fn end(&self) {
        self.state.rendering.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress() {
        let control = RenderControl::new();
        control.begin(4);
        control.advance(1);

        let progress = control.progress();
        assert_eq!((progress.current, progress.total), (1, 4));
        assert!((progress.progress - 0.25).abs() < 1e-9);
        assert!(progress.is_rendering);
    }

    #[test]
    fn test_stop_resets_counters() {
        let control = RenderControl::new();
        control.begin(4);
        control.advance(2);
        control.stop();
        control.advance(3);

        let progress = control.progress();
        assert_eq!((progress.current, progress.total), (0, 0));
        assert!(!progress.is_rendering);
    }

    #[tokio::test]
    async fn test_resume_wakes_waiter() {
        let control = RenderControl::new();
        control.pause();

        let waiter = control.clone();
        let handle = tokio::spawn(async move { waiter.wait_while_paused().await });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        control.resume();
        assert!(handle.await.is_ok());
    }
}
