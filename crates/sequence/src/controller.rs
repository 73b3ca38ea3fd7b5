//! The sequence controller: loads a user's record, applies the trigger to
//! the state machine, hands sends to the notifier, and persists the result.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use drip_core::config::SequenceConfig;
use drip_core::event_bus::{make_event, noop_sink, EventSink};
use drip_core::types::{EventType, UserProfile};
use drip_core::{DripError, DripResult};

use crate::catalog::StepCatalog;
use crate::notifier::{Notifier, OutboundEmail};
use crate::profiles::ProfileLookup;
use crate::store::SequenceStore;
use crate::types::{
    CompletionReport, EngagementKind, ProcessOutcome, SideEffect, Trigger, TriggerKind,
    WelcomeSequence,
};

/// Core welcome-sequence engine. All trigger processing for one user runs
/// under that user's lock, so concurrent triggers serialize instead of
/// racing the read-modify-write against the store.
pub struct SequenceController {
    catalog: StepCatalog,
    store: Arc<dyn SequenceStore>,
    profiles: Arc<dyn ProfileLookup>,
    notifier: Arc<dyn Notifier>,
    event_sink: Arc<dyn EventSink>,
    config: SequenceConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for SequenceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceController")
            .field("catalog_steps", &self.catalog.len())
            .field("collection", &self.config.collection)
            .finish()
    }
}

impl SequenceController {
    /// Creates a controller over the given collaborators with default
    /// configuration and no event emission.
    pub fn new(
        catalog: StepCatalog,
        store: Arc<dyn SequenceStore>,
        profiles: Arc<dyn ProfileLookup>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            catalog,
            store,
            profiles,
            notifier,
            event_sink: noop_sink(),
            config: SequenceConfig::default(),
            locks: DashMap::new(),
        }
    }

    /// Attach an event sink for emitting lifecycle events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn with_config(mut self, config: SequenceConfig) -> Self {
        self.config = config;
        self
    }

    /// Applies one trigger to the user's sequence and returns the resulting
    /// state plus the side effects that fired.
    ///
    /// Store and notifier failures propagate to the caller; the host's
    /// retry layer re-delivers the trigger.
    pub fn process(&self, trigger: &Trigger) -> DripResult<ProcessOutcome> {
        if !self.config.enabled {
            debug!(user_id = %trigger.user_id, "Sequence engine disabled, ignoring trigger");
            return Ok(ProcessOutcome::noop(None));
        }
        if self.catalog.is_empty() {
            return Err(DripError::Config("step catalog is empty".to_string()));
        }
        if self.catalog.len() > self.config.max_catalog_steps {
            return Err(DripError::Config(format!(
                "step catalog has {} steps, configured maximum is {}",
                self.catalog.len(),
                self.config.max_catalog_steps
            )));
        }

        let lock = self.user_lock(&trigger.user_id);
        let _guard = lock.lock();

        let profile = self.profiles.get(&trigger.user_id)?;
        let consent = profile
            .as_ref()
            .map(|p| p.marketing_consent)
            .unwrap_or(false);
        let existing = self.store.get(&self.config.collection, &trigger.user_id)?;

        match existing {
            None => {
                if trigger.kind != TriggerKind::Start {
                    debug!(
                        user_id = %trigger.user_id,
                        kind = ?trigger.kind,
                        "No sequence record, nothing to progress"
                    );
                    return Ok(ProcessOutcome::noop(None));
                }
                if !consent {
                    info!(
                        user_id = %trigger.user_id,
                        "Skipping sequence creation: no marketing consent"
                    );
                    return Ok(ProcessOutcome::noop(None));
                }
                self.start_sequence(trigger, profile.as_ref())
            }
            // Terminal records never mutate again, consent or not.
            Some(seq) if seq.completed => Ok(ProcessOutcome::noop(Some(seq))),
            Some(seq) if !consent => self.freeze_revoked(trigger, seq),
            Some(seq) => match trigger.kind {
                TriggerKind::Start => {
                    debug!(user_id = %trigger.user_id, "Sequence already exists, start is idempotent");
                    Ok(ProcessOutcome::noop(Some(seq)))
                }
                TriggerKind::Progression => self.advance(trigger, seq, profile.as_ref(), true),
                TriggerKind::Timer => self.advance(trigger, seq, profile.as_ref(), false),
            },
        }
    }

    /// Records an open or click reported by the delivery subsystem onto the
    /// user's sequence. Returns false when there is nothing to record onto.
    pub fn record_engagement(
        &self,
        user_id: &str,
        step: usize,
        kind: EngagementKind,
    ) -> DripResult<bool> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock();

        let Some(mut seq) = self.store.get(&self.config.collection, user_id)? else {
            return Ok(false);
        };
        if seq.completed {
            return Ok(false);
        }

        match kind {
            EngagementKind::Opened => seq.opened_steps.push(step),
            EngagementKind::Clicked => seq.clicked_steps.push(step),
        }
        seq.version += 1;
        self.store.set(&self.config.collection, user_id, seq.clone())?;

        debug!(user_id = %user_id, step, ?kind, "Engagement recorded");
        self.event_sink.emit(make_event(
            EventType::EngagementRecorded,
            user_id,
            Some(seq.email.clone()),
            Some(step),
            serde_json::json!({ "kind": kind }),
        ));
        Ok(true)
    }

    /// Read-through accessor for the user's current sequence record.
    pub fn sequence(&self, user_id: &str) -> DripResult<Option<WelcomeSequence>> {
        self.store.get(&self.config.collection, user_id)
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    fn start_sequence(
        &self,
        trigger: &Trigger,
        profile: Option<&UserProfile>,
    ) -> DripResult<ProcessOutcome> {
        let now = trigger.at;
        let mut seq = WelcomeSequence {
            user_id: trigger.user_id.clone(),
            email: trigger.email.clone(),
            current_step: 0,
            total_steps: self.catalog.len(),
            next_email_at: now,
            completed: false,
            started_at: now,
            last_email_sent: None,
            opened_steps: Vec::new(),
            clicked_steps: Vec::new(),
            version: 0,
        };

        // Step 0 fires immediately; the wait for step 1 starts now.
        let effect = self.send_step(&mut seq, 0, trigger, profile)?;
        if let Some(delay) = self.catalog.delay_hours(1) {
            seq.next_email_at = now + Duration::hours(delay);
        }

        seq.version += 1;
        self.store
            .set(&self.config.collection, &trigger.user_id, seq.clone())?;

        info!(
            user_id = %trigger.user_id,
            total_steps = seq.total_steps,
            "Welcome sequence started"
        );
        self.event_sink.emit(make_event(
            EventType::SequenceStarted,
            &trigger.user_id,
            Some(seq.email.clone()),
            Some(0),
            serde_json::json!({
                "signup_source": profile.map(|p| p.signup_source.clone()),
            }),
        ));
        metrics::counter!("sequence.started").increment(1);

        Ok(ProcessOutcome {
            state: Some(seq),
            effects: vec![effect],
        })
    }

    /// Advances an active sequence by one step, completes it, or no-ops,
    /// per the trigger kind. `allow_engagement_bonus` is true only for
    /// progression triggers.
    fn advance(
        &self,
        trigger: &Trigger,
        mut seq: WelcomeSequence,
        profile: Option<&UserProfile>,
        allow_engagement_bonus: bool,
    ) -> DripResult<ProcessOutcome> {
        let now = trigger.at;

        // A step index past the live catalog (data corruption, or a catalog
        // that shrank under an in-flight sequence) completes immediately
        // rather than leaving the record stuck.
        if seq.current_step >= self.catalog.len() {
            warn!(
                user_id = %seq.user_id,
                current_step = seq.current_step,
                catalog_steps = self.catalog.len(),
                "Sequence step past catalog end, completing"
            );
            return self.complete(trigger, seq);
        }

        let next = seq.current_step + 1;

        if allow_engagement_bonus {
            // Progression: the final step completes regardless of timing.
            if next >= self.catalog.len() {
                return self.complete(trigger, seq);
            }
            let due = now >= seq.next_email_at;
            if !due && !engagement_bonus(&seq) {
                debug!(user_id = %seq.user_id, next_step = next, "Next step not yet due");
                metrics::counter!("sequence.not_yet_due").increment(1);
                return Ok(ProcessOutcome::noop(Some(seq)));
            }
        } else {
            // Timer: strictly time-gated, engagement never applies.
            if now < seq.next_email_at {
                debug!(user_id = %seq.user_id, next_step = next, "Next step not yet due");
                metrics::counter!("sequence.not_yet_due").increment(1);
                return Ok(ProcessOutcome::noop(Some(seq)));
            }
            if next >= self.catalog.len() {
                return self.complete(trigger, seq);
            }
        }

        let effect = self.send_step(&mut seq, next, trigger, profile)?;

        // Schedule the step after this one from the moment of this send;
        // after the final step the timestamp is left untouched.
        if let Some(delay) = self.catalog.delay_hours(next + 1) {
            seq.next_email_at = now + Duration::hours(delay);
        }

        seq.version += 1;
        self.store
            .set(&self.config.collection, &seq.user_id, seq.clone())?;

        info!(user_id = %seq.user_id, step = next, "Sequence advanced");
        self.event_sink.emit(make_event(
            EventType::StepAdvanced,
            &seq.user_id,
            Some(seq.email.clone()),
            Some(next),
            serde_json::Value::Null,
        ));

        Ok(ProcessOutcome {
            state: Some(seq),
            effects: vec![effect],
        })
    }

    fn complete(&self, trigger: &Trigger, mut seq: WelcomeSequence) -> DripResult<ProcessOutcome> {
        let now = trigger.at;
        let total_emails_sent = seq.current_step + 1;
        let report = CompletionReport {
            user_id: seq.user_id.clone(),
            email: seq.email.clone(),
            completed_at: now,
            total_emails_sent,
            emails_opened: seq.opened_steps.len(),
            emails_clicked: seq.clicked_steps.len(),
            engagement_rate: seq.opened_steps.len() as f64 / total_emails_sent as f64,
        };

        seq.completed = true;
        // Terminal timestamp bump; never read again once completed.
        seq.next_email_at = now;
        seq.version += 1;
        self.store
            .set(&self.config.collection, &seq.user_id, seq.clone())?;

        info!(
            user_id = %seq.user_id,
            emails_sent = total_emails_sent,
            engagement_rate = report.engagement_rate,
            "Welcome sequence completed"
        );
        self.event_sink.emit(make_event(
            EventType::SequenceCompleted,
            &seq.user_id,
            Some(seq.email.clone()),
            Some(seq.current_step),
            serde_json::to_value(&report)?,
        ));
        metrics::counter!("sequence.completed").increment(1);

        Ok(ProcessOutcome {
            state: Some(seq),
            effects: vec![SideEffect::Completed(report)],
        })
    }

    fn freeze_revoked(
        &self,
        trigger: &Trigger,
        mut seq: WelcomeSequence,
    ) -> DripResult<ProcessOutcome> {
        warn!(user_id = %trigger.user_id, "Marketing consent revoked, freezing sequence");
        seq.completed = true;
        seq.next_email_at = trigger.at;
        seq.version += 1;
        self.store
            .set(&self.config.collection, &trigger.user_id, seq.clone())?;

        self.event_sink.emit(make_event(
            EventType::ConsentRevoked,
            &trigger.user_id,
            Some(seq.email.clone()),
            Some(seq.current_step),
            serde_json::Value::Null,
        ));
        metrics::counter!("sequence.consent_revoked").increment(1);

        Ok(ProcessOutcome::noop(Some(seq)))
    }

    /// Renders and enqueues the given catalog step, then marks it as the
    /// current step. A notifier failure propagates before any state is
    /// persisted, so a retried trigger re-sends the same step.
    fn send_step(
        &self,
        seq: &mut WelcomeSequence,
        step_idx: usize,
        trigger: &Trigger,
        profile: Option<&UserProfile>,
    ) -> DripResult<SideEffect> {
        let step = self.catalog.get(step_idx).ok_or_else(|| {
            DripError::Template(format!("catalog has no step {step_idx}"))
        })?;

        let mut values = HashMap::new();
        let first_name = trigger
            .first_name
            .clone()
            .or_else(|| profile.and_then(|p| p.first_name.clone()));
        if let Some(name) = first_name {
            values.insert("first_name".to_string(), name);
        }
        let rendered = step.template.render(&values);

        self.notifier.enqueue(OutboundEmail {
            destination: seq.email.clone(),
            subject: rendered.subject.clone(),
            body: rendered.body,
            metadata: serde_json::json!({
                "template_id": step.template.template_id,
                "step": step_idx,
                "user_id": seq.user_id,
            }),
        })?;

        seq.current_step = step_idx;
        seq.last_email_sent = Some(trigger.at);

        debug!(
            user_id = %seq.user_id,
            step = step_idx,
            template_id = %step.template.template_id,
            "Email queued"
        );
        self.event_sink.emit(make_event(
            EventType::EmailQueued,
            &seq.user_id,
            Some(seq.email.clone()),
            Some(step_idx),
            serde_json::json!({ "template_id": step.template.template_id }),
        ));
        metrics::counter!("sequence.emails_queued").increment(1);

        Ok(SideEffect::EmailQueued {
            step: step_idx,
            subject: rendered.subject,
        })
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Any click, or more than one open, lets a progression trigger fire the
/// next step ahead of schedule.
fn engagement_bonus(seq: &WelcomeSequence) -> bool {
    !seq.clicked_steps.is_empty() || seq.opened_steps.len() > 1
}
