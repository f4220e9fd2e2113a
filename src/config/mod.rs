//! Runtime configuration

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::errors::{DialogError, DialogResult};

/// Host settings for a [`DialogManager`](crate::handlers::DialogManager)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Exposed read-only through the `settings` memory scope
    pub settings: Value,
    /// Prefix for every storage key
    pub storage_prefix: String,
    /// Route turn errors through the `error` event before failing the turn
    pub emit_error_events: bool,
    /// Upper bound on nested dialog frames plus stack entries
    pub max_stack_depth: usize,
    /// Locale used when the inbound activity carries none
    pub default_locale: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            settings: Value::Object(Default::default()),
            storage_prefix: "dialog".to_string(),
            emit_error_events: true,
            max_stack_depth: 64,
            default_locale: "en-us".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from JSON text; missing fields take defaults
    pub fn from_json(text: &str) -> DialogResult<Self> {
        let config: RuntimeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> DialogResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DialogError::Resource(format!("{}: {e}", path.display())))?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), "loaded runtime configuration");
        Ok(config)
    }

    fn validate(&self) -> DialogResult<()> {
        if self.max_stack_depth == 0 {
            return Err(DialogError::configuration("RuntimeConfig", "maxStackDepth must be at least 1"));
        }
        if !self.settings.is_object() {
            return Err(DialogError::configuration("RuntimeConfig", "settings must be an object"));
        }
        Ok(())
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = RuntimeConfig::from_json(r#"{"settings": {"botName": "Todo"}, "emitErrorEvents": false}"#).unwrap();
        assert_eq!(config.settings, json!({"botName": "Todo"}));
        assert!(!config.emit_error_events);
        assert_eq!(config.max_stack_depth, 64);
        assert_eq!(config.default_locale, "en-us");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(RuntimeConfig::from_json(r#"{"maxStackDepth": 0}"#).is_err());
        assert!(RuntimeConfig::from_json(r#"{"settings": 3}"#).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("adaptive-dialog-config-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, r#"{"storagePrefix": "bot"}"#).await.unwrap();
        let config = RuntimeConfig::load(&path).await.unwrap();
        assert_eq!(config.storage_prefix, "bot");
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
