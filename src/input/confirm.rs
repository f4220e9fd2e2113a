//! Yes/no input

use serde_json::Value;

use super::{InputDialog, InputDialogCore, InputRecognizer};

const YES: [&str; 7] = ["yes", "y", "yeah", "yep", "true", "ok", "okay"];
const NO: [&str; 5] = ["no", "n", "nope", "false", "nah"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmRecognizer;

impl InputRecognizer for ConfirmRecognizer {
    fn kind(&self) -> &'static str {
        "ConfirmInput"
    }

    fn recognize(&self, input: &Value, _locale: &str) -> Option<Value> {
        let text = match input {
            Value::Bool(_) => return Some(input.clone()),
            Value::String(text) => text.trim().trim_end_matches(['.', '!']).to_lowercase(),
            _ => return None,
        };
        if YES.contains(&text.as_str()) {
            Some(Value::Bool(true))
        } else if NO.contains(&text.as_str()) {
            Some(Value::Bool(false))
        } else {
            None
        }
    }
}

pub type ConfirmInput = InputDialog<ConfirmRecognizer>;

impl InputDialog<ConfirmRecognizer> {
    pub fn new(property: impl Into<String>) -> Self {
        Self::with_recognizer(
            InputDialogCore {
                property: Some(property.into()),
                ..Default::default()
            },
            ConfirmRecognizer,
        )
    }
}
