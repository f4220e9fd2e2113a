//! Evaluation of parsed expressions and the built-in function table

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::errors::ExpressionError;
use crate::memory::{is_truthy, resolve};

type EvalResult = Result<Value, ExpressionError>;

impl Expr {
    /// Evaluate against a memory snapshot keyed by scope name
    pub fn evaluate(&self, memory: &Value) -> EvalResult {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(path) => Ok(resolve(memory, path).unwrap_or(Value::Null)),
            Expr::Array(items) => items
                .iter()
                .map(|item| item.evaluate(memory))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Unary(op, operand) => {
                let value = operand.evaluate(memory)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
                    UnaryOp::Negate => number(-as_f64(&value, "-")?),
                }
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let result = is_truthy(&lhs.evaluate(memory)?) && is_truthy(&rhs.evaluate(memory)?);
                Ok(Value::Bool(result))
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let result = is_truthy(&lhs.evaluate(memory)?) || is_truthy(&rhs.evaluate(memory)?);
                Ok(Value::Bool(result))
            }
            Expr::Binary(op, lhs, rhs) => binary(*op, lhs.evaluate(memory)?, rhs.evaluate(memory)?),
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(memory))
                    .collect::<Result<Vec<_>, _>>()?;
                call(name, args)
            }
        }
    }
}

/// Structural equality that treats `1` and `1.0` as equal
pub fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => lhs == rhs,
    }
}

/// Render a value the way templates and `string()` show it
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number(value: f64) -> EvalResult {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Ok(Value::from(value as i64));
    }
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::Evaluation(format!("{value} is not a finite number")))
}

fn as_f64(value: &Value, op: &str) -> Result<f64, ExpressionError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ExpressionError::Evaluation(format!("'{op}' cannot use {n}"))),
        other => Err(ExpressionError::Evaluation(format!(
            "'{op}' expects numbers, got {other}"
        ))),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering, ExpressionError> {
    match (lhs, rhs) {
        (Value::Number(_), Value::Number(_)) => {
            let (a, b) = (as_f64(lhs, "<")?, as_f64(rhs, "<")?);
            a.partial_cmp(&b)
                .ok_or_else(|| ExpressionError::Evaluation("cannot compare NaN".into()))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(ExpressionError::Evaluation(format!(
            "cannot compare {lhs} with {rhs}"
        ))),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> EvalResult {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::NotEqual => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Less => Ok(Value::Bool(compare(&lhs, &rhs)? == Ordering::Less)),
        BinaryOp::LessOrEqual => Ok(Value::Bool(compare(&lhs, &rhs)? != Ordering::Greater)),
        BinaryOp::Greater => Ok(Value::Bool(compare(&lhs, &rhs)? == Ordering::Greater)),
        BinaryOp::GreaterOrEqual => Ok(Value::Bool(compare(&lhs, &rhs)? != Ordering::Less)),
        BinaryOp::Add => match (&lhs, &rhs) {
            (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!(
                "{}{}",
                to_display_string(&lhs),
                to_display_string(&rhs)
            ))),
            _ => number(as_f64(&lhs, "+")? + as_f64(&rhs, "+")?),
        },
        BinaryOp::Subtract => number(as_f64(&lhs, "-")? - as_f64(&rhs, "-")?),
        BinaryOp::Multiply => number(as_f64(&lhs, "*")? * as_f64(&rhs, "*")?),
        BinaryOp::Divide => {
            let divisor = as_f64(&rhs, "/")?;
            if divisor == 0.0 {
                return Err(ExpressionError::Evaluation("division by zero".into()));
            }
            number(as_f64(&lhs, "/")? / divisor)
        }
        BinaryOp::Modulo => {
            let divisor = as_f64(&rhs, "%")?;
            if divisor == 0.0 {
                return Err(ExpressionError::Evaluation("modulo by zero".into()));
            }
            number(as_f64(&lhs, "%")? % divisor)
        }
        BinaryOp::And => Ok(Value::Bool(is_truthy(&lhs) && is_truthy(&rhs))),
        BinaryOp::Or => Ok(Value::Bool(is_truthy(&lhs) || is_truthy(&rhs))),
    }
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), ExpressionError> {
    if args.len() != expected {
        return Err(ExpressionError::Evaluation(format!(
            "{name}() expects {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn length(name: &str, value: &Value) -> EvalResult {
    match value {
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(map) => Ok(Value::from(map.len())),
        Value::Null => Ok(Value::from(0)),
        other => Err(ExpressionError::Evaluation(format!(
            "{name}() cannot measure {other}"
        ))),
    }
}

fn call(name: &str, args: Vec<Value>) -> EvalResult {
    match name {
        "exists" => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(!args[0].is_null()))
        }
        "count" | "length" => {
            arity(name, &args, 1)?;
            length(name, &args[0])
        }
        "empty" => {
            arity(name, &args, 1)?;
            let empty = match &args[0] {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                _ => false,
            };
            Ok(Value::Bool(empty))
        }
        "not" => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(!is_truthy(&args[0])))
        }
        "equals" => {
            arity(name, &args, 2)?;
            Ok(Value::Bool(values_equal(&args[0], &args[1])))
        }
        "contains" => {
            arity(name, &args, 2)?;
            let found = match (&args[0], &args[1]) {
                (Value::String(s), needle) => s.contains(&to_display_string(needle)),
                (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
                (Value::Object(map), Value::String(key)) => map.contains_key(key),
                _ => false,
            };
            Ok(Value::Bool(found))
        }
        "concat" => {
            if args.iter().all(|a| a.is_array()) && !args.is_empty() {
                let items = args
                    .into_iter()
                    .flat_map(|a| match a {
                        Value::Array(items) => items,
                        _ => Vec::new(),
                    })
                    .collect();
                Ok(Value::Array(items))
            } else {
                Ok(Value::String(args.iter().map(to_display_string).collect()))
            }
        }
        "string" => {
            arity(name, &args, 1)?;
            Ok(Value::String(to_display_string(&args[0])))
        }
        "int" => {
            arity(name, &args, 1)?;
            match &args[0] {
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::Evaluation(format!("int() cannot parse '{s}'")))
                    .map(|f| Value::from(f.trunc() as i64)),
                other => Ok(Value::from(as_f64(other, "int")?.trunc() as i64)),
            }
        }
        "float" => {
            arity(name, &args, 1)?;
            let f = match &args[0] {
                Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
                    ExpressionError::Evaluation(format!("float() cannot parse '{s}'"))
                })?,
                other => as_f64(other, "float")?,
            };
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| ExpressionError::Evaluation("float() produced NaN".into()))
        }
        "toLower" | "toUpper" => {
            arity(name, &args, 1)?;
            let text = to_display_string(&args[0]);
            Ok(Value::String(if name == "toLower" {
                text.to_lowercase()
            } else {
                text.to_uppercase()
            }))
        }
        "first" | "last" => {
            arity(name, &args, 1)?;
            let value = match &args[0] {
                Value::Array(items) if name == "first" => items.first().cloned(),
                Value::Array(items) => items.last().cloned(),
                Value::String(s) if name == "first" => s.chars().next().map(|c| Value::String(c.into())),
                Value::String(s) => s.chars().last().map(|c| Value::String(c.into())),
                _ => None,
            };
            Ok(value.unwrap_or(Value::Null))
        }
        "join" => {
            arity(name, &args, 2)?;
            let separator = to_display_string(&args[1]);
            match &args[0] {
                Value::Array(items) => Ok(Value::String(
                    items.iter().map(to_display_string).collect::<Vec<_>>().join(&separator),
                )),
                other => Err(ExpressionError::Evaluation(format!("join() expects an array, got {other}"))),
            }
        }
        "if" => {
            arity(name, &args, 3)?;
            let mut args = args;
            let otherwise = args.pop().unwrap_or_default();
            let then = args.pop().unwrap_or_default();
            Ok(if is_truthy(&args[0]) { then } else { otherwise })
        }
        "json" => {
            arity(name, &args, 1)?;
            let text = to_display_string(&args[0]);
            serde_json::from_str(&text)
                .map_err(|e| ExpressionError::Evaluation(format!("json() failed: {e}")))
        }
        "createObject" => Ok(Value::Object(Map::new())),
        _ => Err(ExpressionError::Evaluation(format!("unknown function '{name}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse_expression;
    use super::*;
    use serde_json::json;

    fn eval(text: &str, memory: &Value) -> EvalResult {
        parse_expression(text).unwrap().evaluate(memory)
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let memory = json!({});
        assert_eq!(eval("1 + 2 * 3", &memory).unwrap(), json!(7));
        assert_eq!(eval("7 / 2", &memory).unwrap(), json!(3.5));
        assert_eq!(eval("10 % 4 == 2", &memory).unwrap(), json!(true));
        assert_eq!(eval("'a' + 1", &memory).unwrap(), json!("a1"));
        assert!(eval("1 / 0", &memory).is_err());
        assert!(eval("'a' < 1", &memory).is_err());
    }

    #[test]
    fn test_logical_operators_on_values() {
        assert_eq!(binary(BinaryOp::Or, json!(false), json!("x")).unwrap(), json!(true));
        assert_eq!(binary(BinaryOp::Or, json!(0), json!(null)).unwrap(), json!(false));
        assert_eq!(binary(BinaryOp::And, json!(true), json!("")).unwrap(), json!(false));

        let memory = json!({"dialog": {"done": false}});
        assert_eq!(eval("dialog.done || 1 == 1", &memory).unwrap(), json!(true));
        assert_eq!(eval("dialog.done && 1 / 0", &memory).unwrap(), json!(false));
        assert_eq!(eval("true || 1 / 0", &memory).unwrap(), json!(true));
    }

    #[test]
    fn test_paths_resolve_against_scopes() {
        let memory = json!({
            "user": {"name": "Ada", "todos": ["milk"]},
            "dialog": {"count": 2},
            "turn": {"recognized": {"intent": "Add", "entities": {"item": ["eggs"]}}}
        });
        assert_eq!(eval("user.name", &memory).unwrap(), json!("Ada"));
        assert_eq!(eval("count + 1", &memory).unwrap(), json!(3));
        assert_eq!(eval("count(user.todos)", &memory).unwrap(), json!(1));
        assert_eq!(eval("@item", &memory).unwrap(), json!("eggs"));
        assert_eq!(eval("exists(@item) && turn.recognized.intent == 'Add'", &memory).unwrap(), json!(true));
        assert_eq!(eval("user.missing", &memory).unwrap(), Value::Null);
    }

    #[test]
    fn test_functions() {
        let memory = json!({"dialog": {"items": ["a", "b"]}});
        assert_eq!(eval("join(dialog.items, ', ')", &memory).unwrap(), json!("a, b"));
        assert_eq!(eval("contains(dialog.items, 'b')", &memory).unwrap(), json!(true));
        assert_eq!(eval("concat('x', 'y')", &memory).unwrap(), json!("xy"));
        assert_eq!(eval("if(empty(dialog.items), 'none', first(dialog.items))", &memory).unwrap(), json!("a"));
        assert_eq!(eval("toUpper('ok')", &memory).unwrap(), json!("OK"));
        assert!(eval("nope(1)", &memory).is_err());
    }

    #[test]
    fn test_numeric_equality_ignores_representation() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!({"a": [1]}), &json!({"a": [1.0]})));
        assert!(!values_equal(&json!("22"), &json!(22)));
    }
}
