//! The fixed, ordered catalog of welcome-series email steps.

use drip_core::templates::{MessageTemplate, TemplateVariable};

/// One email step: how long after the previous step it becomes eligible,
/// and what to send.
#[derive(Debug, Clone)]
pub struct StepDefinition {
    /// 0-indexed position in the catalog.
    pub step_number: usize,
    /// Hours after the previous step fires before this one becomes eligible.
    /// Step 0 always uses 0 (fires immediately at sequence creation).
    pub delay_hours: i64,
    pub template: MessageTemplate,
}

/// Ordered list of all steps in a sequence. Static data; build once and
/// share by reference.
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<StepDefinition>,
}

impl StepCatalog {
    /// Build a catalog from arbitrary steps. Step numbers are re-indexed to
    /// match catalog order, so reshaped catalogs stay internally consistent.
    pub fn new(mut steps: Vec<StepDefinition>) -> Self {
        for (idx, step) in steps.iter_mut().enumerate() {
            step.step_number = idx;
        }
        Self { steps }
    }

    /// The default 4-step onboarding series: immediate welcome, tips at two
    /// days, case studies at one week, check-in at one month.
    pub fn welcome_series() -> Self {
        let first_name = || TemplateVariable::with_default("first_name", "there");

        Self::new(vec![
            StepDefinition {
                step_number: 0,
                delay_hours: 0,
                template: MessageTemplate::new(
                    "welcome_day0",
                    "Welcome aboard, {{first_name}}!",
                    "Hi {{first_name}},\n\nThanks for signing up. Here is everything \
                     you need to get started with your new account.",
                    vec![first_name()],
                ),
            },
            StepDefinition {
                step_number: 1,
                delay_hours: 48,
                template: MessageTemplate::new(
                    "tips_day2",
                    "{{first_name}}, three tips to get more done",
                    "Hi {{first_name}},\n\nNow that you have had a couple of days to \
                     explore, here are three features most new users miss.",
                    vec![first_name()],
                ),
            },
            StepDefinition {
                step_number: 2,
                delay_hours: 168,
                template: MessageTemplate::new(
                    "stories_day7",
                    "How teams like yours use us",
                    "Hi {{first_name}},\n\nA week in already. Here are two short \
                     customer stories that show what is possible.",
                    vec![first_name()],
                ),
            },
            StepDefinition {
                step_number: 3,
                delay_hours: 720,
                template: MessageTemplate::new(
                    "checkin_day30",
                    "One month in: how is it going, {{first_name}}?",
                    "Hi {{first_name}},\n\nYou have been with us a month. Hit reply \
                     and tell us what is working and what is not.",
                    vec![first_name()],
                ),
            },
        ])
    }

    pub fn get(&self, idx: usize) -> Option<&StepDefinition> {
        self.steps.get(idx)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Delay of the step at `idx`, or None past the end of the catalog.
    pub fn delay_hours(&self, idx: usize) -> Option<i64> {
        self.steps.get(idx).map(|s| s.delay_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_welcome_series_shape() {
        let catalog = StepCatalog::welcome_series();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.delay_hours(0), Some(0));
        assert_eq!(catalog.delay_hours(1), Some(48));
        assert_eq!(catalog.delay_hours(2), Some(168));
        assert_eq!(catalog.delay_hours(3), Some(720));
        assert_eq!(catalog.delay_hours(4), None);
    }

    #[test]
    fn test_step_numbers_match_positions() {
        let catalog = StepCatalog::welcome_series();
        for idx in 0..catalog.len() {
            assert_eq!(catalog.get(idx).unwrap().step_number, idx);
        }
    }

    #[test]
    fn test_custom_catalog_reindexes() {
        let catalog = StepCatalog::welcome_series();
        // Drop the middle steps; the remaining two should be renumbered.
        let steps = vec![
            catalog.get(0).unwrap().clone(),
            catalog.get(3).unwrap().clone(),
        ];
        let reshaped = StepCatalog::new(steps);
        assert_eq!(reshaped.len(), 2);
        assert_eq!(reshaped.get(1).unwrap().step_number, 1);
        assert_eq!(reshaped.get(1).unwrap().delay_hours, 720);
    }

    #[test]
    fn test_subject_renders_first_name() {
        let catalog = StepCatalog::welcome_series();
        let mut values = HashMap::new();
        values.insert("first_name".to_string(), "Ana".to_string());
        let rendered = catalog.get(0).unwrap().template.render(&values);
        assert!(rendered.subject.contains("Ana"));
    }
}
