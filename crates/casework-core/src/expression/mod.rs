//! Rule evaluation against a case's variable scope.
//!
//! The engine never interprets rules itself: it hands an [`Expression`] and
//! the case's [`VariableScope`] to a [`RuleEvaluator`] and only looks at the
//! boolean that comes back. Any expression language can be plugged in by
//! implementing the trait (closures implement it too, which keeps tests
//! short).
//!
//! [`ExpressionEvaluator`] is the default implementation. It understands a
//! small boolean language:
//!
//! - variables, including dotted paths into JSON objects: `order.vip`
//! - literals: `true`, `false`, `null`, numbers, `'single'` or `"double"`
//!   quoted strings
//! - `!` / `not`, `&&` / `and`, `||` / `or`, parentheses
//! - comparisons: `==`, `!=`, `<`, `<=`, `>`, `>=`
//!
//! An optional `${ ... }` wrapper is accepted, so `${required}` and
//! `required` mean the same thing.
//!
//! ```rust
//! use casework_core::expression::{Expression, ExpressionEvaluator, RuleEvaluator};
//! use casework_core::models::VariableScope;
//! use serde_json::json;
//!
//! let mut scope = VariableScope::new();
//! scope.set("amount", json!(250));
//!
//! let evaluator = ExpressionEvaluator;
//! let rule = Expression::from("${amount > 100 && !approved}");
//! assert!(evaluator.evaluate(&rule, &scope).unwrap());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{CaseError, Result},
    models::VariableScope,
};

mod eval;
mod parser;

pub use eval::{evaluate_ast, truthy, EvalError};
pub use parser::{parse, Ast, CompareOp, ParseError};

/// Source text of a rule, as written in a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expression(String);

impl Expression {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Expression {
    fn from(source: &str) -> Self {
        Self(source.to_string())
    }
}

impl From<String> for Expression {
    fn from(source: String) -> Self {
        Self(source)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Evaluates rule expressions to a boolean.
///
/// Implementations must not mutate anything observable and must return the
/// same answer for the same scope contents.
pub trait RuleEvaluator: Send + Sync {
    /// # Errors
    ///
    /// Returns `CaseError::EvaluationFailure` when the expression cannot be
    /// evaluated against `scope`.
    fn evaluate(&self, expression: &Expression, scope: &VariableScope) -> Result<bool>;
}

impl<F> RuleEvaluator for F
where
    F: Fn(&Expression, &VariableScope) -> Result<bool> + Send + Sync,
{
    fn evaluate(&self, expression: &Expression, scope: &VariableScope) -> Result<bool> {
        self(expression, scope)
    }
}

/// Default evaluator for the built-in expression language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator;

impl RuleEvaluator for ExpressionEvaluator {
    fn evaluate(&self, expression: &Expression, scope: &VariableScope) -> Result<bool> {
        let failure = |reason: String| CaseError::EvaluationFailure {
            expression: expression.to_string(),
            reason,
        };
        let ast = parse(expression.as_str()).map_err(|e| failure(e.to_string()))?;
        let value = evaluate_ast(&ast, scope).map_err(|e| failure(e.to_string()))?;
        Ok(truthy(&value))
    }
}
