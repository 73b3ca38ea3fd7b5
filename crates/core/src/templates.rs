//! Message template rendering with `{{variable}}` syntax.
//!
//! Templates declare their variables up front; rendering substitutes only
//! declared slots, so stray braces in user-supplied values are left alone.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A named slot in a template, with an optional fallback value used when
/// the caller supplies nothing.
#[derive(Debug, Clone)]
pub struct TemplateVariable {
    pub name: String,
    pub default_value: Option<String>,
}

impl TemplateVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: Some(default_value.into()),
        }
    }
}

/// A subject + body template identified by a stable template id.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub template_id: String,
    pub subject: String,
    pub body: String,
    pub variables: Vec<TemplateVariable>,
}

impl MessageTemplate {
    pub fn new(
        template_id: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        variables: Vec<TemplateVariable>,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            subject: subject.into(),
            body: body.into(),
            variables,
        }
    }

    /// Render subject and body with the given variable values. Declared
    /// variables with no value fall back to their default, then to empty.
    pub fn render(&self, values: &HashMap<String, String>) -> RenderedMessage {
        RenderedMessage {
            template_id: self.template_id.clone(),
            subject: substitute(&self.subject, values, &self.variables),
            body: substitute(&self.body, values, &self.variables),
            rendered_at: Utc::now(),
        }
    }
}

/// Fully substituted output ready to hand to a delivery channel.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub template_id: String,
    pub subject: String,
    pub body: String,
    pub rendered_at: DateTime<Utc>,
}

fn substitute(
    template_str: &str,
    values: &HashMap<String, String>,
    var_defs: &[TemplateVariable],
) -> String {
    let mut result = template_str.to_string();
    for var_def in var_defs {
        let placeholder = format!("{{{{{}}}}}", var_def.name);
        let value = values
            .get(&var_def.name)
            .cloned()
            .or_else(|| var_def.default_value.clone())
            .unwrap_or_default();
        result = result.replace(&placeholder, &value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting_template() -> MessageTemplate {
        MessageTemplate::new(
            "welcome_day0",
            "Welcome aboard, {{first_name}}!",
            "Hi {{first_name}}, thanks for joining {{product}}.",
            vec![
                TemplateVariable::with_default("first_name", "there"),
                TemplateVariable::new("product"),
            ],
        )
    }

    #[test]
    fn test_render_with_values() {
        let tmpl = greeting_template();
        let mut values = HashMap::new();
        values.insert("first_name".to_string(), "Ana".to_string());
        values.insert("product".to_string(), "DripEngine".to_string());

        let rendered = tmpl.render(&values);
        assert_eq!(rendered.subject, "Welcome aboard, Ana!");
        assert_eq!(rendered.body, "Hi Ana, thanks for joining DripEngine.");
        assert_eq!(rendered.template_id, "welcome_day0");
    }

    #[test]
    fn test_default_fallback() {
        let tmpl = greeting_template();
        let rendered = tmpl.render(&HashMap::new());
        assert_eq!(rendered.subject, "Welcome aboard, there!");
    }

    #[test]
    fn test_undeclared_placeholder_untouched() {
        let tmpl = MessageTemplate::new(
            "t",
            "{{first_name}} says {{undeclared}}",
            "",
            vec![TemplateVariable::with_default("first_name", "there")],
        );
        let rendered = tmpl.render(&HashMap::new());
        assert_eq!(rendered.subject, "there says {{undeclared}}");
    }
}
