//! Notification sink that reports through tracing.

use tracing::{info, warn};

use crate::config::Messages;
use crate::submission::ports::Notifier;

/// Emits user notices as `leadform::notice` log events.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier {
    messages: Messages,
}

impl TracingNotifier {
    /// Create a notifier falling back to `messages` for default texts.
    pub fn new(messages: Messages) -> Self {
        Self { messages }
    }
}

impl Notifier for TracingNotifier {
    fn show_success(&self, message: Option<&str>) {
        let message = message.unwrap_or(&self.messages.success);
        info!(target: "leadform::notice", kind = "success", "{}", message);
    }

    fn show_error(&self, message: Option<&str>) {
        let message = message.unwrap_or(&self.messages.error);
        warn!(target: "leadform::notice", kind = "error", "{}", message);
    }
}
