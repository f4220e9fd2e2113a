//! Expression evaluation
//!
//! The engine only needs "parse text, evaluate against memory, get a value or
//! an error". [`ExpressionEvaluator`] is that seam; [`ExpressionEngine`] is the
//! built-in implementation. Expression-valued configuration fields are held
//! as [`ExpressionProperty`] values that keep their source text and compile
//! it on first use.

pub mod functions;
pub mod parser;

pub use functions::{to_display_string, values_equal};
pub use parser::{parse_expression, Expr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::errors::{DialogError, ExpressionError};
use crate::memory::is_truthy;

/// A parsed expression ready for repeated evaluation
pub trait CompiledExpression: Send + Sync + fmt::Debug {
    fn evaluate(&self, memory: &Value) -> Result<Value, ExpressionError>;
}

/// Parses expression text into a [`CompiledExpression`]
pub trait ExpressionEvaluator: Send + Sync {
    fn parse(&self, text: &str) -> Result<Arc<dyn CompiledExpression>, ExpressionError>;
}

impl CompiledExpression for Expr {
    fn evaluate(&self, memory: &Value) -> Result<Value, ExpressionError> {
        Expr::evaluate(self, memory)
    }
}

/// Built-in expression language
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionEngine;

impl ExpressionEvaluator for ExpressionEngine {
    fn parse(&self, text: &str) -> Result<Arc<dyn CompiledExpression>, ExpressionError> {
        Ok(Arc::new(parse_expression(text)?))
    }
}

/// An expression-valued field: source text plus a lazily compiled form
#[derive(Clone)]
pub struct ExpressionProperty {
    source: String,
    literal: Option<Value>,
    compiled: OnceLock<Arc<dyn CompiledExpression>>,
}

impl ExpressionProperty {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            literal: None,
            compiled: OnceLock::new(),
        }
    }

    /// A property that always yields `value` without evaluation
    pub fn literal(value: Value) -> Self {
        Self {
            source: value.to_string(),
            literal: Some(value),
            compiled: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replace the source text, discarding the compiled form
    pub fn set_source(&mut self, source: impl Into<String>) {
        *self = Self::new(source);
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    fn compiled(&self, evaluator: &dyn ExpressionEvaluator) -> Result<Arc<dyn CompiledExpression>, DialogError> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled.clone());
        }
        let compiled = evaluator
            .parse(&self.source)
            .map_err(|e| e.into_dialog_error(&self.source))?;
        Ok(self.compiled.get_or_init(|| compiled).clone())
    }

    /// Evaluate against a memory snapshot
    pub fn evaluate(&self, evaluator: &dyn ExpressionEvaluator, memory: &Value) -> Result<Value, DialogError> {
        if let Some(value) = &self.literal {
            return Ok(value.clone());
        }
        self.compiled(evaluator)?
            .evaluate(memory)
            .map_err(|e| e.into_dialog_error(&self.source))
    }

    /// Evaluate and apply truthiness
    pub fn evaluate_bool(&self, evaluator: &dyn ExpressionEvaluator, memory: &Value) -> Result<bool, DialogError> {
        self.evaluate(evaluator, memory).map(|value| is_truthy(&value))
    }

    /// Evaluate and render as display text
    pub fn evaluate_string(&self, evaluator: &dyn ExpressionEvaluator, memory: &Value) -> Result<String, DialogError> {
        self.evaluate(evaluator, memory).map(|value| to_display_string(&value))
    }
}

impl fmt::Debug for ExpressionProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExpressionProperty").field(&self.source).finish()
    }
}

impl PartialEq for ExpressionProperty {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.literal == other.literal
    }
}

impl From<&str> for ExpressionProperty {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for ExpressionProperty {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

impl Serialize for ExpressionProperty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.literal {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_str(&self.source),
        }
    }
}

impl<'de> Deserialize<'de> for ExpressionProperty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(source) => Ok(Self::new(source)),
            other => Ok(Self::literal(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compiles_once_and_resets_on_reassignment() {
        let mut property = ExpressionProperty::new("dialog.x + 1");
        assert!(!property.is_compiled());
        let memory = json!({"dialog": {"x": 1}});
        assert_eq!(property.evaluate(&ExpressionEngine, &memory).unwrap(), json!(2));
        assert!(property.is_compiled());

        property.set_source("dialog.x * 10");
        assert!(!property.is_compiled());
        assert_eq!(property.evaluate(&ExpressionEngine, &memory).unwrap(), json!(10));
    }

    #[test]
    fn test_deserializes_literals_and_sources() {
        let property: ExpressionProperty = serde_json::from_value(json!("user.name")).unwrap();
        assert_eq!(property.source(), "user.name");

        let property: ExpressionProperty = serde_json::from_value(json!({"a": 1})).unwrap();
        let value = property.evaluate(&ExpressionEngine, &json!({})).unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(serde_json::to_value(&property).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_parse_errors_carry_source() {
        let property = ExpressionProperty::new("1 +");
        let err = property.evaluate(&ExpressionEngine, &json!({})).unwrap_err();
        assert!(matches!(err, DialogError::Expression { ref expression, .. } if expression == "1 +"));
    }
}
