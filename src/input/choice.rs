//! Pick-one-of-several input

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{InputDialog, InputDialogCore, InputRecognizer};
use crate::value_objects::Activity;

/// One selectable option
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

impl Choice {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            synonyms: Vec::new(),
        }
    }

    pub fn with_synonyms(mut self, synonyms: Vec<String>) -> Self {
        self.synonyms = synonyms;
        self
    }

    fn matches(&self, text: &str) -> bool {
        self.value.eq_ignore_ascii_case(text) || self.synonyms.iter().any(|s| s.eq_ignore_ascii_case(text))
    }
}

/// Whether the result is the choice value or its zero-based index
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ChoiceOutputFormat {
    #[default]
    Value,
    Index,
}

/// How choices are appended to the prompt
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ListStyle {
    None,
    #[default]
    Inline,
    List,
}

#[derive(Debug, Clone, Default)]
pub struct ChoiceRecognizer {
    pub choices: Vec<Choice>,
    pub output_format: ChoiceOutputFormat,
    pub style: ListStyle,
}

impl ChoiceRecognizer {
    fn find(&self, text: &str) -> Option<usize> {
        let text = text.trim();
        if let Some(index) = self.choices.iter().position(|choice| choice.matches(text)) {
            return Some(index);
        }
        let ordinal = text.parse::<usize>().ok()?;
        (1..=self.choices.len()).contains(&ordinal).then(|| ordinal - 1)
    }

    fn inline_list(&self) -> String {
        let values: Vec<&str> = self.choices.iter().map(|c| c.value.as_str()).collect();
        match values.as_slice() {
            [] => String::new(),
            [only] => only.to_string(),
            [head @ .., last] => format!("{}, or {last}", head.join(", ")),
        }
    }
}

impl InputRecognizer for ChoiceRecognizer {
    fn kind(&self) -> &'static str {
        "ChoiceInput"
    }

    fn recognize(&self, input: &Value, _locale: &str) -> Option<Value> {
        let index = match input {
            Value::String(text) => self.find(text)?,
            Value::Number(n) => {
                let ordinal = usize::try_from(n.as_u64()?).ok()?;
                (1..=self.choices.len()).contains(&ordinal).then(|| ordinal - 1)?
            }
            _ => return None,
        };
        Some(match self.output_format {
            ChoiceOutputFormat::Value => Value::String(self.choices[index].value.clone()),
            ChoiceOutputFormat::Index => Value::from(index),
        })
    }

    fn decorate_prompt(&self, activity: &mut Activity) {
        if self.choices.is_empty() {
            return;
        }
        let text = activity.text.get_or_insert_with(String::new);
        match self.style {
            ListStyle::None => {}
            ListStyle::Inline => {
                text.push_str(&format!(" ({})", self.inline_list()));
            }
            ListStyle::List => {
                for (i, choice) in self.choices.iter().enumerate() {
                    text.push_str(&format!("\n   {}. {}", i + 1, choice.value));
                }
            }
        }
    }
}

pub type ChoiceInput = InputDialog<ChoiceRecognizer>;

impl InputDialog<ChoiceRecognizer> {
    pub fn new(property: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self::with_recognizer(
            InputDialogCore {
                property: Some(property.into()),
                ..Default::default()
            },
            ChoiceRecognizer {
                choices,
                ..Default::default()
            },
        )
    }

    pub fn with_output_format(mut self, format: ChoiceOutputFormat) -> Self {
        self.recognizer.output_format = format;
        self
    }

    pub fn with_style(mut self, style: ListStyle) -> Self {
        self.recognizer.style = style;
        self
    }
}
