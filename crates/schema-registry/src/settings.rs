//! Runtime configuration
//!
//! Layered loading: an optional `registry.yaml` next to the process,
//! overridden by `REGISTRY_`-prefixed environment variables
//! (e.g. `REGISTRY_COMPATIBILITY=FULL`).

use serde::{Deserialize, Serialize};

use schema_registry_core::{CompatibilityLevel, RegistryError, Result};

/// Top-level registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Compatibility level used when neither subject nor context-global
    /// config sets one
    #[serde(default)]
    pub compatibility: CompatibilityLevel,

    /// Normalize schema text on register/lookup unless the request or
    /// subject config says otherwise
    #[serde(default)]
    pub normalize: bool,

    /// Storage backend selection
    #[serde(default)]
    pub storage: StorageSettings,

    /// Tracing filter directive (e.g. `info`, `schema_registry=debug`)
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        RegistrySettings {
            compatibility: CompatibilityLevel::default(),
            normalize: false,
            storage: StorageSettings::default(),
            log_filter: default_log_filter(),
            log_json: false,
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageSettings {
    /// The in-memory reference store
    #[default]
    Memory,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl RegistrySettings {
    /// Load from `registry.yaml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load with an explicit config file path (used by tests)
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("registry").required(false)),
        };
        builder
            .add_source(config::Environment::with_prefix("REGISTRY").separator("__"))
            .build()
            .and_then(|loaded| loaded.try_deserialize())
            .map_err(|e| RegistryError::Internal(format!("configuration error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_contract() {
        let settings = RegistrySettings::default();
        assert_eq!(settings.compatibility, CompatibilityLevel::Backward);
        assert!(!settings.normalize);
        assert!(matches!(settings.storage, StorageSettings::Memory));
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn yaml_round_trip() {
        let yaml = "compatibility: FULL_TRANSITIVE\nnormalize: true\nstorage:\n  type: memory\n";
        let settings: RegistrySettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.compatibility, CompatibilityLevel::FullTransitive);
        assert!(settings.normalize);
    }
}
