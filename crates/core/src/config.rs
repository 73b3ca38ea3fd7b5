use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `DRIP__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub sequence: SequenceConfig,
}

/// Settings for the welcome-sequence engine.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    #[serde(default = "default_sequence_enabled")]
    pub enabled: bool,
    /// Store collection the per-user sequence records live under.
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_max_catalog_steps")]
    pub max_catalog_steps: usize,
}

// Default functions
fn default_node_id() -> String {
    "drip-01".to_string()
}
fn default_sequence_enabled() -> bool {
    true
}
fn default_collection() -> String {
    "welcome_sequences".to_string()
}
fn default_max_catalog_steps() -> usize {
    32
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_sequence_enabled(),
            collection: default_collection(),
            max_catalog_steps: default_max_catalog_steps(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            sequence: SequenceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("DRIP")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.node_id, "drip-01");
        assert!(cfg.sequence.enabled);
        assert_eq!(cfg.sequence.collection, "welcome_sequences");
    }
}
