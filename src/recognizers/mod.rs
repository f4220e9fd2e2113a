//! Utterance recognition
//!
//! A [`Recognizer`] turns an activity into scored intents and extracted
//! entities. The adaptive dialog stores the result under `turn.recognized`
//! so trigger conditions can address it with the `#intent` and `@entity`
//! shorthands.

pub mod regex_recognizer;

pub use regex_recognizer::{IntentPattern, RegexRecognizer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::DialogResult;
use crate::value_objects::Activity;

/// Intent name reported when nothing matched
pub const NONE_INTENT: &str = "None";

/// Score attached to one intent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IntentScore {
    pub score: f64,
}

/// Output of a recognizer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecognizerResult {
    /// Utterance that was recognized
    pub text: String,
    pub intents: BTreeMap<String, IntentScore>,
    /// Entity name to list of values
    pub entities: Map<String, Value>,
}

impl RecognizerResult {
    /// Result with only the `None` intent
    pub fn none(text: impl Into<String>) -> Self {
        let mut intents = BTreeMap::new();
        intents.insert(NONE_INTENT.to_string(), IntentScore { score: 1.0 });
        Self {
            text: text.into(),
            intents,
            entities: Map::new(),
        }
    }

    /// Highest scoring intent; ties go to the name that sorts first
    pub fn top_intent(&self) -> Option<(&str, f64)> {
        self.intents
            .iter()
            .fold(None, |best: Option<(&str, f64)>, (name, score)| match best {
                Some((_, top)) if top >= score.score => best,
                _ => Some((name.as_str(), score.score)),
            })
    }
}

/// Extracts intents and entities from an activity
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, activity: &Activity) -> DialogResult<RecognizerResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_intent() {
        let mut result = RecognizerResult::none("hi");
        assert_eq!(result.top_intent(), Some(("None", 1.0)));

        result.intents.clear();
        result.intents.insert("Greeting".into(), IntentScore { score: 0.4 });
        result.intents.insert("Help".into(), IntentScore { score: 0.9 });
        assert_eq!(result.top_intent(), Some(("Help", 0.9)));

        result.intents.clear();
        assert_eq!(result.top_intent(), None);
    }
}
