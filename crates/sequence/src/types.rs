use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user drip sequence record, persisted wholesale in the sequence store.
///
/// Invariant: `current_step < total_steps` while `completed` is false. Once
/// `completed` flips to true the record is terminally frozen apart from the
/// timestamp bump performed at completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeSequence {
    pub user_id: String,
    /// Destination address captured at creation time; not re-validated later.
    pub email: String,
    /// Index of the most recently sent catalog step.
    pub current_step: usize,
    pub total_steps: usize,
    /// When the next step becomes eligible to fire.
    pub next_email_at: DateTime<Utc>,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub last_email_sent: Option<DateTime<Utc>>,
    /// Step indices the user opened, in arrival order.
    #[serde(default)]
    pub opened_steps: Vec<usize>,
    /// Step indices the user clicked, in arrival order.
    #[serde(default)]
    pub clicked_steps: Vec<usize>,
    /// Bumped on every persisted write; audit trail for store adapters
    /// that support conditional updates.
    #[serde(default)]
    pub version: u64,
}

/// External signal instructing the controller to evaluate a user's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// User signup: create the sequence and fire step 0.
    Start,
    /// Engagement-driven evaluation; may advance early via the engagement bonus.
    Progression,
    /// Periodic tick from the host scheduler; advances only when due.
    Timer,
}

/// A trigger delivered by the host, with an explicit evaluation clock so
/// tests and replays are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub user_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub at: DateTime<Utc>,
}

impl Trigger {
    pub fn new(kind: TriggerKind, user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            kind,
            user_id: user_id.into(),
            email: email.into(),
            first_name: None,
            at: Utc::now(),
        }
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Kind of engagement callback reported by the delivery subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Opened,
    Clicked,
}

/// Summary emitted when a sequence reaches its terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    pub user_id: String,
    pub email: String,
    pub completed_at: DateTime<Utc>,
    pub total_emails_sent: usize,
    pub emails_opened: usize,
    pub emails_clicked: usize,
    pub engagement_rate: f64,
}

/// Side effect produced while processing a trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SideEffect {
    EmailQueued { step: usize, subject: String },
    Completed(CompletionReport),
}

/// Result of processing one trigger: the persisted state afterwards (if any
/// record exists) and the side effects that fired.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub state: Option<WelcomeSequence>,
    pub effects: Vec<SideEffect>,
}

impl ProcessOutcome {
    pub fn noop(state: Option<WelcomeSequence>) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    pub fn sent_step(&self) -> Option<usize> {
        self.effects.iter().find_map(|e| match e {
            SideEffect::EmailQueued { step, .. } => Some(*step),
            _ => None,
        })
    }

    pub fn completion(&self) -> Option<&CompletionReport> {
        self.effects.iter().find_map(|e| match e {
            SideEffect::Completed(report) => Some(report),
            _ => None,
        })
    }
}
