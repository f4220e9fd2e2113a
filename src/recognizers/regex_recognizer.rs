//! Pattern-based recognizer

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{IntentScore, Recognizer, RecognizerResult};
use crate::errors::{DialogError, DialogResult};
use crate::value_objects::Activity;

/// Declarative form of one intent pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IntentPattern {
    pub intent: String,
    pub pattern: String,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    intent: String,
    regex: Regex,
}

/// Matches utterances against case-insensitive regular expressions
///
/// The first matching pattern decides the intent, scored 1.0. Named capture
/// groups from that match become entities, each holding a list of values.
#[derive(Debug, Clone, Default)]
pub struct RegexRecognizer {
    patterns: Vec<CompiledPattern>,
}

impl RegexRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an intent pattern, rejecting invalid expressions
    pub fn with_intent(mut self, intent: impl Into<String>, pattern: &str) -> DialogResult<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| DialogError::configuration("RegexRecognizer", format!("invalid pattern '{pattern}': {e}")))?;
        self.patterns.push(CompiledPattern {
            intent: intent.into(),
            regex,
        });
        Ok(self)
    }

    pub fn from_patterns(patterns: &[IntentPattern]) -> DialogResult<Self> {
        patterns
            .iter()
            .try_fold(Self::new(), |recognizer, p| recognizer.with_intent(p.intent.clone(), &p.pattern))
    }

    fn recognize_text(&self, text: &str) -> RecognizerResult {
        for pattern in &self.patterns {
            let Some(captures) = pattern.regex.captures(text) else {
                continue;
            };
            let mut result = RecognizerResult {
                text: text.to_string(),
                ..Default::default()
            };
            result
                .intents
                .insert(pattern.intent.clone(), IntentScore { score: 1.0 });
            for name in pattern.regex.capture_names().flatten() {
                if let Some(found) = captures.name(name) {
                    let values = result
                        .entities
                        .entry(name.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(items) = values {
                        items.push(Value::String(found.as_str().to_string()));
                    }
                }
            }
            debug!(intent = %pattern.intent, entities = result.entities.len(), "regex intent matched");
            return result;
        }
        RecognizerResult::none(text)
    }
}

#[async_trait]
impl Recognizer for RegexRecognizer {
    async fn recognize(&self, activity: &Activity) -> DialogResult<RecognizerResult> {
        Ok(self.recognize_text(activity.text_or_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recognizer() -> RegexRecognizer {
        RegexRecognizer::new()
            .with_intent("AddItem", r"^add (?P<item>.+)$")
            .unwrap()
            .with_intent("Help", r"\bhelp\b")
            .unwrap()
    }

    #[tokio::test]
    async fn test_intent_and_entities() {
        let result = recognizer()
            .recognize(&Activity::message("Add buy milk"))
            .await
            .unwrap();
        assert_eq!(result.top_intent(), Some(("AddItem", 1.0)));
        assert_eq!(result.entities.get("item"), Some(&json!(["buy milk"])));
    }

    #[tokio::test]
    async fn test_no_match_yields_none_intent() {
        let result = recognizer()
            .recognize(&Activity::message("what's up"))
            .await
            .unwrap();
        assert_eq!(result.top_intent(), Some(("None", 1.0)));
        assert!(result.entities.is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let err = RegexRecognizer::new().with_intent("Bad", "(").unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
