use crossbeam_channel as chan;
use serde::Serialize;

/// Progress notifications from a streaming session. Hosts poll them with
/// [`EventReceiver::try_recv`] from their own loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum StreamEvent {
    #[serde(rename_all = "camelCase")]
    ChunkProgress {
        current: usize,
        total: usize,
        percentage: f64,
        chunk_id: usize,
        kind: &'static str,
    },

    /// Math placeholders were rendered again after the engine loaded
    #[serde(rename_all = "camelCase")]
    MathReady { refreshed: usize },

    #[serde(rename_all = "camelCase")]
    Complete {
        total_chunks: usize,
        completed_chunks: usize,
        fallback_count: usize,
        total_time_ms: f64,
        stopped: bool,
    },
}

/// Sending side held by the orchestrator. Sending never blocks and a
/// dropped receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    tx: Option<chan::Sender<StreamEvent>>,
}

pub struct EventReceiver {
    rx: chan::Receiver<StreamEvent>,
}

impl EventSender {
    pub fn channel() -> (EventSender, EventReceiver) {
        let (tx, rx) = chan::unbounded();
        (EventSender { tx: Some(tx) }, EventReceiver { rx })
    }

    pub fn send(&self, event: StreamEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        let _ = tx.send(event);
    }
}

impl EventReceiver {
    pub fn try_recv(&self) -> Option<StreamEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything sent so far.
    pub fn drain(&self) -> Vec<StreamEvent> {
        self.rx.try_iter().collect()
    }
}
