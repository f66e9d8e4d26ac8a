//! Best-effort operator notifications

use std::sync::Arc;

use tracing::{debug, warn};

use crate::gateways::Notifier;

/// Sends operator messages through the messaging gateway. Delivery failures are logged and
/// swallowed; no caller ever sees them.
#[derive(Clone)]
pub struct OperatorNotifier {
    notifier: Option<Arc<dyn Notifier>>,
    recipient: Option<String>,
}

impl OperatorNotifier {
    pub fn new(notifier: Arc<dyn Notifier>, recipient: Option<String>) -> Self {
        Self {
            notifier: Some(notifier),
            recipient,
        }
    }

    /// A notifier that drops every message.
    pub fn disabled() -> Self {
        Self {
            notifier: None,
            recipient: None,
        }
    }

    pub async fn notify(&self, text: &str) {
        let (Some(notifier), Some(recipient)) = (&self.notifier, &self.recipient) else {
            debug!("No operator recipient configured, dropping notification: {}", text);
            return;
        };

        if let Err(e) = notifier.send_message(recipient, text).await {
            warn!(recipient = %recipient, "Operator notification failed: {}", e);
        }
    }
}
