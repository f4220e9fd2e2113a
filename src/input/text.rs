//! Free-text input

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{InputDialog, InputDialogCore, InputRecognizer};
use crate::expressions::to_display_string;

/// Normalization applied to the reply
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TextOutputFormat {
    #[default]
    None,
    Trim,
    Lowercase,
    Uppercase,
}

#[derive(Debug, Clone, Default)]
pub struct TextRecognizer {
    pub output_format: TextOutputFormat,
}

impl InputRecognizer for TextRecognizer {
    fn kind(&self) -> &'static str {
        "TextInput"
    }

    fn recognize(&self, input: &Value, _locale: &str) -> Option<Value> {
        let text = match input {
            Value::String(text) => text.clone(),
            Value::Number(_) | Value::Bool(_) => to_display_string(input),
            _ => return None,
        };
        let text = match self.output_format {
            TextOutputFormat::None => text,
            TextOutputFormat::Trim => text.trim().to_string(),
            TextOutputFormat::Lowercase => text.to_lowercase(),
            TextOutputFormat::Uppercase => text.to_uppercase(),
        };
        if text.trim().is_empty() {
            return None;
        }
        Some(Value::String(text))
    }
}

pub type TextInput = InputDialog<TextRecognizer>;

impl InputDialog<TextRecognizer> {
    pub fn new(property: impl Into<String>) -> Self {
        Self::with_recognizer(
            InputDialogCore {
                property: Some(property.into()),
                ..Default::default()
            },
            TextRecognizer::default(),
        )
    }

    pub fn with_output_format(mut self, format: TextOutputFormat) -> Self {
        self.recognizer.output_format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_formats() {
        let mut recognizer = TextRecognizer::default();
        assert_eq!(recognizer.recognize(&json!("  Ada "), "en-us"), Some(json!("  Ada ")));
        recognizer.output_format = TextOutputFormat::Trim;
        assert_eq!(recognizer.recognize(&json!("  Ada "), "en-us"), Some(json!("Ada")));
        recognizer.output_format = TextOutputFormat::Uppercase;
        assert_eq!(recognizer.recognize(&json!("ada"), "en-us"), Some(json!("ADA")));
        assert_eq!(recognizer.recognize(&json!("   "), "en-us"), None);
        assert_eq!(recognizer.recognize(&json!({"a": 1}), "en-us"), None);
    }
}
