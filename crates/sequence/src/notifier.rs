//! Outbound mail hand-off. The controller builds the payload; delivery,
//! retries, and provider plumbing live behind this trait in the host.

use std::sync::Mutex;

use drip_core::{DripError, DripResult};
use serde::{Deserialize, Serialize};

/// A rendered email ready for the delivery subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub destination: String,
    pub subject: String,
    pub body: String,
    /// Opaque context the delivery layer echoes back on engagement webhooks
    /// (template id, step index, user id).
    pub metadata: serde_json::Value,
}

/// Accepts a rendered message for delivery. Errors propagate to the caller;
/// the controller never retries on its own.
pub trait Notifier: Send + Sync {
    fn enqueue(&self, email: OutboundEmail) -> DripResult<()>;
}

/// Test double that records every enqueued email.
#[derive(Default)]
pub struct CaptureNotifier {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl CaptureNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().expect("notifier mutex poisoned").len()
    }
}

impl Notifier for CaptureNotifier {
    fn enqueue(&self, email: OutboundEmail) -> DripResult<()> {
        self.sent.lock().expect("notifier mutex poisoned").push(email);
        Ok(())
    }
}

/// Test double whose every enqueue fails.
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn enqueue(&self, _email: OutboundEmail) -> DripResult<()> {
        Err(DripError::Notify("simulated delivery failure".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_notifier() {
        let notifier = CaptureNotifier::new();
        assert_eq!(notifier.count(), 0);

        notifier
            .enqueue(OutboundEmail {
                destination: "u1@example.com".to_string(),
                subject: "Welcome aboard, Ana!".to_string(),
                body: "Hi Ana".to_string(),
                metadata: serde_json::json!({"step": 0}),
            })
            .unwrap();

        assert_eq!(notifier.count(), 1);
        assert_eq!(notifier.sent()[0].destination, "u1@example.com");
    }

    #[test]
    fn test_failing_notifier() {
        let notifier = FailingNotifier;
        let result = notifier.enqueue(OutboundEmail {
            destination: "u1@example.com".to_string(),
            subject: String::new(),
            body: String::new(),
            metadata: serde_json::Value::Null,
        });
        assert!(result.is_err());
    }
}
