//! Durable key-value storage for sequence records.

use dashmap::DashMap;
use drip_core::{DripError, DripResult};

use crate::types::WelcomeSequence;

/// Generic collection/key store for `WelcomeSequence` records. Production
/// hosts back this with their state adapter; tests use the in-memory store.
pub trait SequenceStore: Send + Sync {
    fn get(&self, collection: &str, key: &str) -> DripResult<Option<WelcomeSequence>>;
    fn set(&self, collection: &str, key: &str, value: WelcomeSequence) -> DripResult<()>;
}

/// In-memory store keyed by `(collection, key)`.
#[derive(Default)]
pub struct InMemorySequenceStore {
    records: DashMap<(String, String), WelcomeSequence>,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn get(&self, collection: &str, key: &str) -> DripResult<Option<WelcomeSequence>> {
        Ok(self
            .records
            .get(&(collection.to_string(), key.to_string()))
            .map(|r| r.clone()))
    }

    fn set(&self, collection: &str, key: &str, value: WelcomeSequence) -> DripResult<()> {
        self.records
            .insert((collection.to_string(), key.to_string()), value);
        Ok(())
    }
}

/// Store double whose every call fails; used to test error propagation.
pub struct FailingStore;

impl SequenceStore for FailingStore {
    fn get(&self, _collection: &str, _key: &str) -> DripResult<Option<WelcomeSequence>> {
        Err(DripError::Store("simulated read failure".to_string()))
    }

    fn set(&self, _collection: &str, _key: &str, _value: WelcomeSequence) -> DripResult<()> {
        Err(DripError::Store("simulated write failure".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_sequence(user_id: &str) -> WelcomeSequence {
        let now = Utc::now();
        WelcomeSequence {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            current_step: 0,
            total_steps: 4,
            next_email_at: now,
            completed: false,
            started_at: now,
            last_email_sent: None,
            opened_steps: Vec::new(),
            clicked_steps: Vec::new(),
            version: 1,
        }
    }

    #[test]
    fn test_set_then_get() {
        let store = InMemorySequenceStore::new();
        store
            .set("welcome_sequences", "u1", sample_sequence("u1"))
            .unwrap();

        let fetched = store.get("welcome_sequences", "u1").unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().email, "u1@example.com");

        assert!(store.get("welcome_sequences", "u2").unwrap().is_none());
    }

    #[test]
    fn test_collections_are_isolated() {
        let store = InMemorySequenceStore::new();
        store
            .set("welcome_sequences", "u1", sample_sequence("u1"))
            .unwrap();

        assert!(store.get("other_collection", "u1").unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failing_store() {
        let store = FailingStore;
        assert!(store.get("welcome_sequences", "u1").is_err());
        assert!(store
            .set("welcome_sequences", "u1", sample_sequence("u1"))
            .is_err());
    }
}
