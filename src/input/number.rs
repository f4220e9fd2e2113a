//! Numeric input

use serde_json::{Number, Value};

use super::{InputDialog, InputDialogCore, InputRecognizer};

const WORDS: [&str; 11] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberRecognizer;

impl NumberRecognizer {
    fn parse(text: &str) -> Option<Value> {
        let text = text.trim().trim_end_matches(['.', '!', '?']);
        if let Some(position) = WORDS.iter().position(|word| word.eq_ignore_ascii_case(text)) {
            return Some(Value::from(position as i64));
        }
        let cleaned: String = text.chars().filter(|c| *c != ',' && *c != '_').collect();
        if let Ok(integer) = cleaned.parse::<i64>() {
            return Some(Value::from(integer));
        }
        let float = cleaned.parse::<f64>().ok().filter(|f| f.is_finite())?;
        Number::from_f64(float).map(Value::Number)
    }
}

impl InputRecognizer for NumberRecognizer {
    fn kind(&self) -> &'static str {
        "NumberInput"
    }

    fn recognize(&self, input: &Value, _locale: &str) -> Option<Value> {
        match input {
            Value::Number(_) => Some(input.clone()),
            Value::String(text) => Self::parse(text),
            _ => None,
        }
    }
}

pub type NumberInput = InputDialog<NumberRecognizer>;

impl InputDialog<NumberRecognizer> {
    pub fn new(property: impl Into<String>) -> Self {
        Self::with_recognizer(
            InputDialogCore {
                property: Some(property.into()),
                ..Default::default()
            },
            NumberRecognizer,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_numbers() {
        let recognizer = NumberRecognizer;
        assert_eq!(recognizer.recognize(&json!("42"), "en-us"), Some(json!(42)));
        assert_eq!(recognizer.recognize(&json!(" 1,250 "), "en-us"), Some(json!(1250)));
        assert_eq!(recognizer.recognize(&json!("2.5"), "en-us"), Some(json!(2.5)));
        assert_eq!(recognizer.recognize(&json!("Three"), "en-us"), Some(json!(3)));
        assert_eq!(recognizer.recognize(&json!(7), "en-us"), Some(json!(7)));
        assert_eq!(recognizer.recognize(&json!("lots"), "en-us"), None);
        assert_eq!(recognizer.recognize(&json!("inf"), "en-us"), None);
    }
}
