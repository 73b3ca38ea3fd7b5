//! User profile lookup, the consent gate for every send decision.

use dashmap::DashMap;
use drip_core::types::UserProfile;
use drip_core::DripResult;

/// Read-only view onto the host CRM's user profiles.
pub trait ProfileLookup: Send + Sync {
    fn get(&self, user_id: &str) -> DripResult<Option<UserProfile>>;
}

/// In-memory profile table for tests and single-node deployments.
#[derive(Default)]
pub struct InMemoryProfiles {
    profiles: DashMap<String, UserProfile>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    pub fn upsert(&self, profile: UserProfile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    /// Flip the marketing-consent flag for an existing user. Returns false
    /// when the user is unknown.
    pub fn set_consent(&self, user_id: &str, consent: bool) -> bool {
        match self.profiles.get_mut(user_id) {
            Some(mut entry) => {
                entry.marketing_consent = consent;
                true
            }
            None => false,
        }
    }
}

impl ProfileLookup for InMemoryProfiles {
    fn get(&self, user_id: &str) -> DripResult<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).map(|p| p.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn consenting_profile(user_id: &str) -> UserProfile {
        UserProfile {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            first_name: Some("Ana".to_string()),
            marketing_consent: true,
            signup_source: "organic".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let profiles = InMemoryProfiles::new();
        profiles.upsert(consenting_profile("u1"));

        let fetched = profiles.get("u1").unwrap().unwrap();
        assert!(fetched.marketing_consent);
        assert_eq!(fetched.first_name.as_deref(), Some("Ana"));

        assert!(profiles.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_set_consent() {
        let profiles = InMemoryProfiles::new();
        profiles.upsert(consenting_profile("u1"));

        assert!(profiles.set_consent("u1", false));
        assert!(!profiles.get("u1").unwrap().unwrap().marketing_consent);

        assert!(!profiles.set_consent("missing", false));
    }
}
