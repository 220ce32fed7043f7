//! Notification sink port trait.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport failed: {reason}")]
    Transport { reason: String },

    #[error("notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Best-effort text delivery. Implementations must be usable from the
/// notification worker thread.
pub trait NotifyPort: Send {
    fn send(&self, text: &str) -> Result<(), NotifyError>;
}
