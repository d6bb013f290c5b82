// Notifier that forwards user-facing messages to the log
use crate::application::ports::Notifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "analytics_sync::notify", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "analytics_sync::notify", "{}", message);
    }
}
