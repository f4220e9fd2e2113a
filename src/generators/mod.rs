//! Language generation
//!
//! Outgoing text goes through a [`LanguageGenerator`]. The built-in
//! [`TemplateGenerator`] expands `${expression}` (and the older `@{expression}`)
//! placeholders against memory, and `${Name()}` references to named templates
//! loaded from `.lg` text:
//!
//! ```text
//! # Greeting
//! - Hello ${user.name}!
//! ```

pub mod multi_language;

pub use multi_language::{parse_lg_file_name, LanguageGeneratorManager, LanguagePolicy, MultiLanguageGenerator};

use async_trait::async_trait;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::dialogs::DialogContext;
use crate::errors::{DialogError, DialogResult};
use crate::expressions::{to_display_string, ExpressionEvaluator};
use crate::memory::MemoryScope;
use crate::value_objects::{Activity, InputHint};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[$@]\{([^}]*)\}").expect("PLACEHOLDER is a compile-time constant")
});

static TEMPLATE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][\w.]*)\(\s*\)\s*$").expect("TEMPLATE_CALL is a compile-time constant")
});

const MAX_TEMPLATE_DEPTH: usize = 8;

/// Inputs to one generation call
pub struct GenerationRequest<'a> {
    /// Target locale, e.g. `en-us`
    pub locale: &'a str,
    /// Memory snapshot and bound data
    pub data: &'a Value,
    pub expressions: &'a dyn ExpressionEvaluator,
}

/// Renders template text for a locale
#[async_trait]
pub trait LanguageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>, template: &str) -> DialogResult<String>;
}

/// Placeholder expansion plus optional named templates
#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator {
    templates: HashMap<String, Vec<String>>,
}

impl TemplateGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `.lg` text: `# Name` headers followed by `- variant` lines
    pub fn from_lg(text: &str) -> DialogResult<Self> {
        let mut templates: HashMap<String, Vec<String>> = HashMap::new();
        let mut current: Option<String> = None;
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('>') {
                continue;
            }
            if let Some(name) = line.strip_prefix('#') {
                let name = name.trim().trim_end_matches("()").to_string();
                templates.entry(name.clone()).or_default();
                current = Some(name);
            } else if let Some(variant) = line.strip_prefix('-') {
                let Some(name) = &current else {
                    return Err(DialogError::Generation(format!(
                        "line {}: template variant outside of a template",
                        number + 1
                    )));
                };
                templates
                    .entry(name.clone())
                    .or_default()
                    .push(variant.trim().to_string());
            }
        }
        Ok(Self { templates })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    fn expand(&self, request: &GenerationRequest<'_>, template: &str, depth: usize) -> DialogResult<String> {
        if depth > MAX_TEMPLATE_DEPTH {
            return Err(DialogError::Generation(format!(
                "template expansion deeper than {MAX_TEMPLATE_DEPTH} levels"
            )));
        }
        let mut failure = None;
        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
            let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            match self.expand_placeholder(request, body, depth) {
                Ok(text) => text,
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(rendered.into_owned()),
        }
    }

    fn expand_placeholder(&self, request: &GenerationRequest<'_>, body: &str, depth: usize) -> DialogResult<String> {
        if let Some(name) = TEMPLATE_CALL.captures(body).and_then(|c| c.get(1)) {
            if let Some(variant) = self.templates.get(name.as_str()).and_then(|v| v.first()) {
                return self.expand(request, variant, depth + 1);
            }
        }
        let compiled = request
            .expressions
            .parse(body)
            .map_err(|e| DialogError::Generation(format!("'{body}': {e}")))?;
        let value = compiled
            .evaluate(request.data)
            .map_err(|e| DialogError::Generation(format!("'{body}': {e}")))?;
        Ok(to_display_string(&value))
    }
}

#[async_trait]
impl LanguageGenerator for TemplateGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>, template: &str) -> DialogResult<String> {
        self.expand(request, template, 0)
    }
}

/// Render template text with the turn's generator and memory
pub async fn render_text(dc: &DialogContext<'_>, template: &str) -> DialogResult<String> {
    render_with_data(dc, template, Map::new()).await
}

/// Render with extra bindings layered over the `dialog` scope
///
/// Unqualified names resolve against `dialog`, so a binding `item` is
/// reachable as `${item}`.
pub async fn render_with_data(dc: &DialogContext<'_>, template: &str, bindings: Map<String, Value>) -> DialogResult<String> {
    let services = dc.services().clone();
    let locale = dc.turn.locale();
    let mut data = dc.memory_snapshot();
    if let Some(Value::Object(dialog)) = data.get_mut(MemoryScope::Dialog.name()) {
        dialog.extend(bindings);
    }
    let request = GenerationRequest {
        locale: &locale,
        data: &data,
        expressions: services.expressions.as_ref(),
    };
    services.generator.generate(&request, template).await
}

/// Template for an outgoing message activity
///
/// Declarative files may give just the text as a string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "TemplateRepr")]
pub struct ActivityTemplate {
    /// Text template
    pub text: String,
    /// Optional speech template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speak: Option<String>,
}

impl ActivityTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speak: None,
        }
    }

    /// Render into a message activity
    pub async fn bind(&self, dc: &DialogContext<'_>) -> DialogResult<Activity> {
        let text = render_text(dc, &self.text).await?;
        let mut activity = Activity::message(text);
        if let Some(speak) = &self.speak {
            let speech = render_text(dc, speak).await?;
            activity.value = Some(serde_json::json!({ "speak": speech }));
        }
        activity.input_hint = Some(InputHint::AcceptingInput);
        Ok(activity)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateRepr {
    Text(String),
    Full {
        text: String,
        #[serde(default)]
        speak: Option<String>,
    },
}

impl From<TemplateRepr> for ActivityTemplate {
    fn from(repr: TemplateRepr) -> Self {
        match repr {
            TemplateRepr::Text(text) => Self::new(text),
            TemplateRepr::Full { text, speak } => Self { text, speak },
        }
    }
}

impl From<&str> for ActivityTemplate {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::ExpressionEngine;
    use serde_json::json;

    fn request<'a>(data: &'a Value) -> GenerationRequest<'a> {
        GenerationRequest {
            locale: "en-us",
            data,
            expressions: &ExpressionEngine,
        }
    }

    #[tokio::test]
    async fn test_placeholders_expand_against_memory() {
        let data = json!({"user": {"name": "Ada"}, "dialog": {"count": 2}});
        let generator = TemplateGenerator::new();
        let text = generator
            .generate(&request(&data), "Hi ${user.name}, you have @{dialog.count + 1} items")
            .await
            .unwrap();
        assert_eq!(text, "Hi Ada, you have 3 items");
    }

    #[tokio::test]
    async fn test_named_templates() {
        let generator = TemplateGenerator::from_lg(
            "> comment\n# Greeting\n- Hello ${user.name}!\n- Hi!\n# Welcome()\n- ${Greeting()} Welcome back.",
        )
        .unwrap();
        let data = json!({"user": {"name": "Ada"}});
        let text = generator.generate(&request(&data), "${Welcome()}").await.unwrap();
        assert_eq!(text, "Hello Ada! Welcome back.");
    }

    #[tokio::test]
    async fn test_bad_placeholder_is_an_error() {
        let data = json!({});
        let generator = TemplateGenerator::new();
        assert!(generator.generate(&request(&data), "${1 +}").await.is_err());
        assert!(TemplateGenerator::from_lg("- orphan").is_err());
    }

    #[tokio::test]
    async fn test_recursive_templates_are_bounded() {
        let generator = TemplateGenerator::from_lg("# Loop\n- ${Loop()}").unwrap();
        let data = json!({});
        assert!(generator.generate(&request(&data), "${Loop()}").await.is_err());
    }

    #[test]
    fn test_activity_template_from_text_or_object() {
        let short: ActivityTemplate = serde_json::from_value(json!("Hi ${user.name}")).unwrap();
        assert_eq!(short, ActivityTemplate::new("Hi ${user.name}"));
        let full: ActivityTemplate = serde_json::from_value(json!({"text": "Hi", "speak": "Hello"})).unwrap();
        assert_eq!(full.speak.as_deref(), Some("Hello"));
    }
}
