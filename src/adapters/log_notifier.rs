//! Notification sink that only writes to the log. Used when no chat
//! transport is configured.

use crate::ports::notify_port::{NotifyError, NotifyPort};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotifyPort for LogNotifier {
    fn send(&self, text: &str) -> Result<(), NotifyError> {
        info!(target: "sigtrader::notify", "\n{}", text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_fails() {
        assert!(LogNotifier.send("result_signal:\n\n").is_ok());
    }
}
