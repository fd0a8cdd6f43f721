use tracing::info;

use super::models::NotificationIntent;

/// Output port for notification delivery. Handlers hand intents to the
/// dispatcher after the triggering write has committed; delivery itself is
/// fire-and-forget and never blocks or fails the request.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, intent: NotificationIntent);
}

/// Default dispatcher: records the intent in the structured log. Swapping in
/// an SMTP-backed implementation is a deployment concern, not a core one.
pub struct LoggingDispatcher;

impl NotificationDispatcher for LoggingDispatcher {
    fn dispatch(&self, intent: NotificationIntent) {
        info!(
            "Notification intent {} for {}: {}",
            intent.kind.as_str(),
            intent.recipient,
            intent.data
        );
    }
}
