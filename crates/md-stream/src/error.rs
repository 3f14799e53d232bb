/// Misuse of the progressive tracker.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum TrackerError {
    /// The caller's view of the stream doesn't match what was fed.
    #[error("full text out of sync: expected {expected} bytes, got {actual}")]
    OutOfSync { expected: usize, actual: usize },

    #[error("tracker already finished, reset it to start a new session")]
    Finished,
}
