use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marketing profile for a user, as maintained by the host CRM.
///
/// The sequence engine only reads this; profile writes happen elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub first_name: Option<String>,
    /// Gate for every send decision. Revocation mid-sequence freezes the
    /// sequence on the next trigger.
    pub marketing_consent: bool,
    pub signup_source: String,
    pub created_at: DateTime<Utc>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            email: String::new(),
            first_name: None,
            marketing_consent: false,
            signup_source: "unknown".to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle event emitted to the host analytics pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub user_id: String,
    pub email: Option<String>,
    /// Catalog step index the event refers to, where applicable.
    pub step: Option<usize>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SequenceStarted,
    EmailQueued,
    StepAdvanced,
    SequenceCompleted,
    ConsentRevoked,
    EngagementRecorded,
}
