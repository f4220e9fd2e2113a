//! Hierarchical conversation memory
//!
//! Memory is split into named scopes ([`MemoryScope`]) that are addressed
//! through a single path namespace ([`MemoryPath`]). The durable and turn
//! scopes live in [`MemoryState`]; the `dialog`, `this` and `class` scopes are
//! resolved against the dialog stack by
//! [`DialogContext`](crate::dialogs::DialogContext).

pub mod path;
pub mod scopes;

pub use path::{MemoryPath, PathSegment};
pub use scopes::{dialog_path, this_path, turn_path, MemoryScope};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ExpressionError;

/// Scopes owned by the turn rather than by a dialog instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryState {
    /// Per-user values
    pub user: Value,
    /// Per-conversation values
    pub conversation: Value,
    /// Values cleared at the start of each turn
    pub turn: Value,
    /// Host settings, never written by dialogs
    pub settings: Value,
}

impl MemoryState {
    pub fn new(settings: Value) -> Self {
        Self {
            user: empty_object(),
            conversation: empty_object(),
            turn: empty_object(),
            settings,
        }
    }

    /// Root value of a turn-owned scope
    pub fn scope(&self, scope: MemoryScope) -> Option<&Value> {
        match scope {
            MemoryScope::User => Some(&self.user),
            MemoryScope::Conversation => Some(&self.conversation),
            MemoryScope::Turn => Some(&self.turn),
            MemoryScope::Settings => Some(&self.settings),
            _ => None,
        }
    }

    /// Writable root of a turn-owned scope; `settings` is excluded
    pub fn scope_mut(&mut self, scope: MemoryScope) -> Option<&mut Value> {
        match scope {
            MemoryScope::User => Some(&mut self.user),
            MemoryScope::Conversation => Some(&mut self.conversation),
            MemoryScope::Turn => Some(&mut self.turn),
            _ => None,
        }
    }

    /// Clear the turn scope
    pub fn reset_turn(&mut self) {
        self.turn = empty_object();
    }
}

pub(crate) fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Look up a value below `root`
pub fn get_path<'v>(root: &'v Value, segments: &[PathSegment]) -> Option<&'v Value> {
    let mut current = root;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a parsed path against a memory snapshot keyed by scope name
pub fn resolve(snapshot: &Value, path: &MemoryPath) -> Option<Value> {
    let scope = snapshot.get(path.scope.name())?;
    let value = get_path(scope, &path.segments)?;
    match value {
        Value::Array(items) if path.first_element => items.first().cloned(),
        other => Some(other.clone()),
    }
}

/// Write a value below `root`, creating intermediate objects
pub fn set_path(root: &mut Value, segments: &[PathSegment], value: Value) -> Result<(), ExpressionError> {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut current = root;
    for segment in parents {
        current = step_mut(current, segment)?;
    }

    match last {
        PathSegment::Key(key) => {
            if !current.is_object() {
                *current = empty_object();
            }
            if let Value::Object(map) = current {
                map.insert(key.clone(), value);
            }
            Ok(())
        }
        PathSegment::Index(index) => {
            let items = array_mut(current, *index)?;
            items[*index] = value;
            Ok(())
        }
    }
}

fn step_mut<'v>(current: &'v mut Value, segment: &PathSegment) -> Result<&'v mut Value, ExpressionError> {
    match segment {
        PathSegment::Key(key) => {
            if !current.is_object() {
                *current = empty_object();
            }
            match current {
                Value::Object(map) => Ok(map.entry(key.clone()).or_insert(Value::Null)),
                _ => Err(ExpressionError::Evaluation(format!("cannot set '{key}'"))),
            }
        }
        PathSegment::Index(index) => {
            let items = array_mut(current, *index)?;
            Ok(&mut items[*index])
        }
    }
}

/// Array at `current` with room for `index`, growing by one when appending
fn array_mut(current: &mut Value, index: usize) -> Result<&mut Vec<Value>, ExpressionError> {
    if current.is_null() {
        *current = Value::Array(Vec::new());
    }
    match current {
        Value::Array(items) => {
            if index == items.len() {
                items.push(Value::Null);
            }
            if index >= items.len() {
                return Err(ExpressionError::Evaluation(format!(
                    "index {index} out of range for array of length {}",
                    items.len()
                )));
            }
            Ok(items)
        }
        _ => Err(ExpressionError::Evaluation(format!(
            "cannot index a non-array value with [{index}]"
        ))),
    }
}

/// Remove and return the value below `root`
pub fn remove_path(root: &mut Value, segments: &[PathSegment]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    let mut current = root;
    for segment in parents {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (PathSegment::Index(index), Value::Array(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    match (last, current) {
        (PathSegment::Key(key), Value::Object(map)) => map.remove(key),
        (PathSegment::Index(index), Value::Array(items)) if *index < items.len() => {
            Some(items.remove(*index))
        }
        _ => None,
    }
}

/// JavaScript-style truthiness used by guards and conditions
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segs(path: &str) -> Vec<PathSegment> {
        MemoryPath::parse(path).unwrap().segments
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut root = json!({});
        set_path(&mut root, &segs("user.profile.name"), json!("Ada")).unwrap();
        assert_eq!(root, json!({"profile": {"name": "Ada"}}));
    }

    #[test]
    fn test_set_appends_at_array_end() {
        let mut root = json!({});
        set_path(&mut root, &segs("dialog.list[0]"), json!(1)).unwrap();
        set_path(&mut root, &segs("dialog.list[1]"), json!(2)).unwrap();
        assert_eq!(root, json!({"list": [1, 2]}));
        assert!(set_path(&mut root, &segs("dialog.list[5]"), json!(3)).is_err());
    }

    #[test]
    fn test_remove_path() {
        let mut root = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(remove_path(&mut root, &segs("dialog.a.b")), Some(json!(1)));
        assert_eq!(remove_path(&mut root, &segs("dialog.a.missing")), None);
        assert_eq!(root, json!({"a": {"c": 2}}));
    }

    #[test]
    fn test_resolve_first_entity() {
        let snapshot = json!({
            "turn": {"recognized": {"entities": {"city": ["Paris", "Rome"]}}}
        });
        let first = MemoryPath::parse("@city").unwrap();
        let all = MemoryPath::parse("@@city").unwrap();
        assert_eq!(resolve(&snapshot, &first), Some(json!("Paris")));
        assert_eq!(resolve(&snapshot, &all), Some(json!(["Paris", "Rome"])));
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!("false")));
    }
}
