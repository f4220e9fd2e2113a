//! Declarative dialog loading
//!
//! Dialog definitions are JSON documents whose objects name their type with
//! a `$kind` field, e.g. `"Microsoft.SendActivity"`. A [`ComponentRegistry`]
//! maps each kind to a factory that builds the runtime object from the rest
//! of the fields. Kinds are resolved once, at load time; an unknown kind is a
//! configuration error.

mod builtins;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::adaptive::{AdaptiveDialog, FirstSelector, MostSpecificSelector, OnCondition, TriggerSelector};
use crate::dialogs::Action;
use crate::errors::{DialogError, DialogResult};
use crate::expressions::ExpressionProperty;
use crate::recognizers::Recognizer;
use crate::resources::ResourceProvider;

/// `$kind` of an adaptive dialog document
pub const ADAPTIVE_DIALOG_KIND: &str = "Microsoft.AdaptiveDialog";

pub type ActionFactory = Arc<dyn Fn(&ComponentRegistry, &Value) -> DialogResult<Arc<dyn Action>> + Send + Sync>;
pub type TriggerFactory = Arc<dyn Fn(&ComponentRegistry, &Value) -> DialogResult<OnCondition> + Send + Sync>;
pub type RecognizerFactory = Arc<dyn Fn(&ComponentRegistry, &Value) -> DialogResult<Arc<dyn Recognizer>> + Send + Sync>;

/// Deserialize a component's fields, reporting failures against its kind
pub fn parse_config<T: DeserializeOwned>(kind: &str, value: &Value) -> DialogResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| DialogError::configuration(kind, e.to_string()))
}

/// The `$kind` of a component document
pub fn kind_of(value: &Value) -> DialogResult<&str> {
    value
        .get("$kind")
        .and_then(Value::as_str)
        .ok_or_else(|| DialogError::configuration("component", "missing '$kind'"))
}

/// Fields every action accepts
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActionCommon {
    pub id: Option<String>,
    pub disabled: Option<ExpressionProperty>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AdaptiveDialogConfig {
    id: Option<String>,
    recognizer: Option<Value>,
    triggers: Vec<Value>,
    auto_end_dialog: Option<bool>,
    default_result_property: Option<String>,
    selector: Option<Value>,
}

/// Maps `$kind` names to component factories
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    actions: HashMap<String, ActionFactory>,
    triggers: HashMap<String, TriggerFactory>,
    recognizers: HashMap<String, RecognizerFactory>,
}

impl ComponentRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing every built-in action, trigger, input and recognizer
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register(&mut registry);
        registry
    }

    pub fn register_action<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ComponentRegistry, &Value) -> DialogResult<Arc<dyn Action>> + Send + Sync + 'static,
    {
        self.actions.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn register_trigger<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ComponentRegistry, &Value) -> DialogResult<OnCondition> + Send + Sync + 'static,
    {
        self.triggers.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn register_recognizer<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ComponentRegistry, &Value) -> DialogResult<Arc<dyn Recognizer>> + Send + Sync + 'static,
    {
        self.recognizers.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.actions.contains_key(kind) || self.triggers.contains_key(kind) || self.recognizers.contains_key(kind)
    }

    pub fn build_action(&self, value: &Value) -> DialogResult<Arc<dyn Action>> {
        let kind = kind_of(value)?;
        let factory = self
            .actions
            .get(kind)
            .ok_or_else(|| DialogError::configuration(kind, "unknown action kind"))?;
        factory(self, value)
    }

    pub fn build_actions(&self, values: &[Value]) -> DialogResult<Vec<Arc<dyn Action>>> {
        values.iter().map(|value| self.build_action(value)).collect()
    }

    pub fn build_trigger(&self, value: &Value) -> DialogResult<OnCondition> {
        let kind = kind_of(value)?;
        let factory = self
            .triggers
            .get(kind)
            .ok_or_else(|| DialogError::configuration(kind, "unknown trigger kind"))?;
        factory(self, value)
    }

    pub fn build_recognizer(&self, value: &Value) -> DialogResult<Arc<dyn Recognizer>> {
        let kind = kind_of(value)?;
        let factory = self
            .recognizers
            .get(kind)
            .ok_or_else(|| DialogError::configuration(kind, "unknown recognizer kind"))?;
        factory(self, value)
    }

    fn build_selector(value: &Value) -> DialogResult<Arc<dyn TriggerSelector>> {
        match kind_of(value)? {
            "Microsoft.MostSpecificSelector" => Ok(Arc::new(MostSpecificSelector)),
            "Microsoft.FirstSelector" => Ok(Arc::new(FirstSelector)),
            other => Err(DialogError::configuration(other, "unknown selector kind")),
        }
    }

    /// Build an adaptive dialog from its document
    pub fn build_adaptive(&self, value: &Value) -> DialogResult<AdaptiveDialog> {
        let kind = kind_of(value)?;
        if kind != ADAPTIVE_DIALOG_KIND {
            return Err(DialogError::configuration(kind, format!("expected '{ADAPTIVE_DIALOG_KIND}'")));
        }
        let config: AdaptiveDialogConfig = parse_config(kind, value)?;
        let id = config
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DialogError::configuration(kind, "id is required"))?;

        let mut dialog = AdaptiveDialog::new(id.clone());
        if let Some(recognizer) = &config.recognizer {
            dialog = dialog.with_recognizer(self.build_recognizer(recognizer)?);
        }
        if let Some(selector) = &config.selector {
            dialog = dialog.with_selector(Self::build_selector(selector)?);
        }
        if let Some(auto_end) = config.auto_end_dialog {
            dialog = dialog.with_auto_end_dialog(auto_end);
        }
        if let Some(property) = config.default_result_property {
            dialog = dialog.with_default_result_property(property);
        }
        for trigger in &config.triggers {
            dialog = dialog.with_trigger(self.build_trigger(trigger)?);
        }
        debug!(dialog_id = %id, triggers = config.triggers.len(), "built adaptive dialog");
        Ok(dialog)
    }

    /// Parse and build an adaptive dialog from JSON text
    pub fn load_dialog(&self, json: &str) -> DialogResult<AdaptiveDialog> {
        let value: Value = serde_json::from_str(json)?;
        self.build_adaptive(&value)
    }

    /// Load an adaptive dialog from a `.dialog` resource
    pub async fn load_resource(&self, provider: &dyn ResourceProvider, id: &str) -> DialogResult<AdaptiveDialog> {
        let resource = provider
            .get_resource(id)
            .await?
            .ok_or_else(|| DialogError::Resource(format!("dialog resource '{id}' not found")))?;
        let text = resource.read_text().await?;
        let dialog = self.load_dialog(&text)?;
        info!(resource = id, dialog_id = dialog.id(), "loaded declarative dialog");
        Ok(dialog)
    }
}
