//! Evaluation of parsed expressions.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::parser::{Ast, CompareOp};
use crate::models::VariableScope;

/// Runtime failure while evaluating an [`Ast`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError(pub String);

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EvalError {}

/// Truthiness: absent/null is false, numbers are true when non-zero,
/// strings and collections when non-empty.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Evaluates `ast` against `scope`. Unknown variables evaluate to null.
pub fn evaluate_ast(ast: &Ast, scope: &VariableScope) -> Result<Value, EvalError> {
    match ast {
        Ast::Literal(value) => Ok(value.clone()),
        Ast::Variable(path) => Ok(scope.resolve(path).cloned().unwrap_or(Value::Null)),
        Ast::Not(inner) => Ok(Value::Bool(!truthy(&evaluate_ast(inner, scope)?))),
        Ast::And(left, right) => {
            if !truthy(&evaluate_ast(left, scope)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&evaluate_ast(right, scope)?)))
        }
        Ast::Or(left, right) => {
            if truthy(&evaluate_ast(left, scope)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&evaluate_ast(right, scope)?)))
        }
        Ast::Compare(op, left, right) => {
            let left = evaluate_ast(left, scope)?;
            let right = evaluate_ast(right, scope)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => Ok(loosely_equal(left, right)),
        CompareOp::Ne => Ok(!loosely_equal(left, right)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let ordering = order(left, right).ok_or_else(|| {
                EvalError(format!(
                    "cannot compare {} {} {}",
                    type_name(left),
                    op.symbol(),
                    type_name(right)
                ))
            })?;
            Ok(match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

// 1 and 1.0 are equal
fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::expression::parse;

    fn eval(source: &str, scope: &VariableScope) -> Result<Value, EvalError> {
        evaluate_ast(&parse(source).unwrap(), scope)
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(0)));
        assert!(truthy(&json!(0.5)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("x")));
        assert!(!truthy(&json!([])));
        assert!(truthy(&json!({ "a": 1 })));
    }

    #[test]
    fn test_numeric_equality_ignores_representation() {
        let mut scope = VariableScope::new();
        scope.set("n", json!(2.0));
        assert_eq!(eval("n == 2", &scope), Ok(json!(true)));
        assert_eq!(eval("n != 2", &scope), Ok(json!(false)));
    }

    #[test]
    fn test_ordering() {
        let mut scope = VariableScope::new();
        scope.set("n", json!(5));
        scope.set("s", json!("b"));
        assert_eq!(eval("n < 10", &scope), Ok(json!(true)));
        assert_eq!(eval("n >= 5", &scope), Ok(json!(true)));
        assert_eq!(eval("n > 5", &scope), Ok(json!(false)));
        assert_eq!(eval("s <= 'b'", &scope), Ok(json!(true)));
        assert!(eval("missing < 1", &scope).is_err());
    }

    #[test]
    fn test_short_circuit_skips_failing_branch() {
        let scope = VariableScope::new();
        assert_eq!(eval("false && 'x' > 1", &scope), Ok(json!(false)));
        assert_eq!(eval("true || 'x' > 1", &scope), Ok(json!(true)));
    }
}
