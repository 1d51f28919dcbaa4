//! Notifications delivered to the host for each inbound request.

use agentbridge_protocol::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One inbound request, as seen by the host.
///
/// When the request could not be decoded, `value` is [`Value::Nil`] and
/// `error` carries the diagnostic that was also sent back in the ERROR
/// reply. The host is never handed partially decoded data.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// The listener's sequence number for this request (matches the reply).
    pub seqno: u64,
    /// Topic, when the listener accepts framed requests.
    pub topic: Option<String>,
    pub value: Value,
    pub error: Option<String>,
}

impl Notification {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Receives notifications from a listener.
///
/// Called on the listener's task, before the reply is sent. Implementations
/// must not block; hand the notification off (a channel send) and return.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

impl NotificationSink for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        if self.send(notification).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }
}

/// Bounded channels drop the notification when full, so a slow host cannot
/// stall the reply loop.
impl NotificationSink for mpsc::Sender<Notification> {
    fn notify(&self, notification: Notification) {
        match self.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(
                    seqno = dropped.seqno,
                    "notification channel full, notification dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("notification receiver dropped");
            }
        }
    }
}
