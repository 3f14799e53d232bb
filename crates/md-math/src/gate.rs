//! One-time readiness gate for a slow-to-load equation engine.

use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Loading,
    Ready,
    Failed(String),
}

impl EngineStatus {
    pub fn name(&self) -> &'static str {
        match self {
            EngineStatus::Loading => "loading",
            EngineStatus::Ready => "ready",
            EngineStatus::Failed(_) => "failed",
        }
    }
}

/// Read side of the gate. Cheap to clone; every clone sees the same status.
#[derive(Debug, Clone)]
pub struct EngineGate {
    rx: watch::Receiver<EngineStatus>,
}

/// Write side of the gate, held by whoever loads the engine.
#[derive(Debug)]
pub struct EngineLoader {
    tx: watch::Sender<EngineStatus>,
}

impl EngineGate {
    /// A gate for an engine that is usable right away.
    pub fn ready() -> Self {
        let (_tx, rx) = watch::channel(EngineStatus::Ready);
        Self { rx }
    }

    /// A gate that stays loading until the returned loader flips it.
    pub fn loading() -> (EngineLoader, EngineGate) {
        let (tx, rx) = watch::channel(EngineStatus::Loading);
        (EngineLoader { tx }, EngineGate { rx })
    }

    pub fn status(&self) -> EngineStatus {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.rx.borrow() == EngineStatus::Ready
    }

    pub fn is_loading(&self) -> bool {
        *self.rx.borrow() == EngineStatus::Loading
    }

    /// Wait until the engine is no longer loading. A loader dropped while
    /// still loading counts as a failure.
    pub async fn settled(&self) -> EngineStatus {
        let mut rx = self.rx.clone();
        let status = match rx
            .wait_for(|status| *status != EngineStatus::Loading)
            .await
        {
            Ok(status) => status.clone(),
            Err(_) => EngineStatus::Failed("engine loader dropped".to_string()),
        };
        status
    }
}

impl EngineLoader {
    pub fn ready(&self) {
        info!("equation engine ready");
        self.tx.send_replace(EngineStatus::Ready);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("equation engine failed to load: {reason}");
        self.tx.send_replace(EngineStatus::Failed(reason));
    }
}
