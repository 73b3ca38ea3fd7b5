//! Welcome-email drip sequence engine: a per-user state machine that walks
//! new users through a fixed catalog of onboarding emails, driven by start,
//! progression, and timer triggers from the host orchestration layer.

pub mod catalog;
pub mod controller;
pub mod notifier;
pub mod profiles;
pub mod store;
pub mod types;

pub use catalog::StepCatalog;
pub use controller::SequenceController;
