//! Expression evaluation.
//!
//! Conditions in a schema are strings wrapped in `{{ … }}` delimiters,
//! evaluated against a read-only [`Scope`]. Evaluation is behind the
//! [`Evaluator`] strategy trait with two implementations:
//!
//! - [`UnrestrictedEvaluator`]: compiles the expression into a syntax tree
//!   (cached per source text) and interprets it. Supports the full operator
//!   set schema authors use: arithmetic, ternaries, optional chaining,
//!   nullish coalescing, array/object literals, method calls.
//! - [`RestrictedEvaluator`]: a string-splitting recursive descent over a
//!   deliberately small grammar (`!`, grouping, `||`, `&&`, comparisons,
//!   dotted paths with an optional trailing literal-argument call). For hosts
//!   that must not compile anything. It never fails on grammar it does not
//!   understand: the raw operand text comes back instead.
//!
//! The host picks one at construction time through [`EvaluatorKind`]. For
//! every expression inside the restricted grammar the two agree; the shared
//! conformance suite in `tests/evaluator_conformance.rs` holds them to it.
//!
//! # Example
//!
//! ```
//! use dynui::expression::{evaluate_str, EvaluatorKind, Scope};
//! use serde_json::json;
//!
//! let local = json!({ "email_field": "me@example.com" });
//! let global = json!({});
//! let extra = json!({});
//! let scope = Scope::new(&local, &global, &extra);
//!
//! for kind in [EvaluatorKind::Unrestricted, EvaluatorKind::Restricted] {
//!     let evaluator = kind.build();
//!     let value = evaluate_str(
//!         evaluator.as_ref(),
//!         "{{ !!$.email_field?.length && $.email_field.includes('@') }}",
//!         &scope,
//!     )
//!     .unwrap();
//!     assert_eq!(value, Some(json!(true)));
//! }
//! ```

mod parser;
mod restricted;
mod scope;
mod unrestricted;
pub mod value;

pub use restricted::RestrictedEvaluator;
pub use scope::{HostFunctions, NoHostFunctions, Root, Scope, Utilities, UtilityFn};
pub use unrestricted::UnrestrictedEvaluator;
pub use value::Operand;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Failures raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The expression does not parse.
    #[error("syntax error in `{expression}`: {message}")]
    Syntax {
        /// Offending expression.
        expression: String,
        /// What the parser expected.
        message: String,
    },

    /// The expression tried to write through its scope.
    #[error("expression: {expression} should not modify scope")]
    ReadOnlyScope {
        /// Offending expression.
        expression: String,
    },

    /// A bare identifier is not present in the local tier.
    #[error("{name} is not defined (in `{expression}`)")]
    Reference {
        /// Unknown identifier.
        name: String,
        /// Offending expression.
        expression: String,
    },

    /// A member read on `null`/`undefined`, or a call of something that is not a function.
    #[error("type error in `{expression}`: {message}")]
    Type {
        /// Offending expression.
        expression: String,
        /// JavaScript-style description.
        message: String,
    },

    /// A trusted utility under `$$$` reported failure.
    #[error("utility `{name}` failed: {message}")]
    Host {
        /// Dotted path of the utility.
        name: String,
        /// Failure reported by the utility.
        message: String,
    },

    /// The condition is neither an expression string nor a pre-typed value.
    #[error("unsupported condition value: {0}")]
    Unsupported(String),
}

/// Strategy for evaluating the interior of a delimited expression.
pub trait Evaluator {
    /// Short backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Evaluates `source` (the text between `{{` and `}}`).
    ///
    /// # Errors
    ///
    /// Backend specific; see [`UnrestrictedEvaluator`] and [`RestrictedEvaluator`].
    fn evaluate_source(&self, source: &str, scope: &Scope<'_>) -> Result<Operand, ExpressionError>;
}

/// Which backend a host can run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorKind {
    /// The host allows compiling expressions at runtime.
    #[default]
    Unrestricted,
    /// The host forbids it; use the small fixed grammar.
    Restricted,
}

impl EvaluatorKind {
    /// Constructs the backend.
    #[must_use]
    pub fn build(self) -> Box<dyn Evaluator> {
        match self {
            Self::Unrestricted => Box::new(UnrestrictedEvaluator::default()),
            Self::Restricted => Box::new(RestrictedEvaluator),
        }
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrestricted => f.write_str("unrestricted"),
            Self::Restricted => f.write_str("restricted"),
        }
    }
}

/// Returns the text between the delimiters, or `None` when `text` is not a
/// delimited expression or its interior is blank.
#[must_use]
pub fn extract_source(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.trim().is_empty() {
        None
    } else {
        Some(inner)
    }
}

/// Evaluates a condition value.
///
/// Pre-typed inputs bypass parsing: `undefined`/`null` yield `true`, booleans
/// yield themselves, numbers yield their truthiness. Strings that are not a
/// delimited expression also yield `true`, since an absent condition passes.
///
/// # Errors
///
/// Propagates evaluator failures; arrays and objects are rejected with
/// [`ExpressionError::Unsupported`].
pub fn evaluate(
    evaluator: &dyn Evaluator,
    condition: Option<&Value>,
    scope: &Scope<'_>,
) -> Result<Operand, ExpressionError> {
    match condition {
        None | Some(Value::Null) => Ok(Some(Value::Bool(true))),
        Some(Value::Bool(b)) => Ok(Some(Value::Bool(*b))),
        Some(number @ Value::Number(_)) => Ok(Some(Value::Bool(value::truthy(&Some(number.clone()))))),
        Some(Value::String(text)) => evaluate_str(evaluator, text, scope),
        Some(other) => Err(ExpressionError::Unsupported(other.to_string())),
    }
}

/// Evaluates a delimited expression string.
///
/// # Errors
///
/// Propagates evaluator failures.
pub fn evaluate_str(
    evaluator: &dyn Evaluator,
    text: &str,
    scope: &Scope<'_>,
) -> Result<Operand, ExpressionError> {
    let Some(source) = extract_source(text) else {
        tracing::trace!(text = %text, "no delimited expression, condition passes");
        return Ok(Some(Value::Bool(true)));
    };
    let _span = tracing::trace_span!("evaluate", backend = evaluator.name(), source = %source).entered();
    evaluator.evaluate_source(source, scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_source_requires_delimiters() {
        assert_eq!(extract_source("{{ $.a }}"), Some(" $.a "));
        assert_eq!(extract_source("  {{$.a}}\n"), Some("$.a"));
        assert_eq!(extract_source("{{   }}"), None);
        assert_eq!(extract_source("$.a"), None);
        assert_eq!(extract_source("{{ $.a"), None);
    }

    #[test]
    fn pretyped_inputs_bypass_parsing() {
        let empty = json!({});
        let scope = Scope::new(&empty, &empty, &empty);
        let evaluator = EvaluatorKind::Unrestricted.build();
        let eval = |v: Option<&Value>| evaluate(evaluator.as_ref(), v, &scope).unwrap();

        assert_eq!(eval(None), Some(json!(true)));
        assert_eq!(eval(Some(&json!(false))), Some(json!(false)));
        assert_eq!(eval(Some(&json!(0))), Some(json!(false)));
        assert_eq!(eval(Some(&json!(7))), Some(json!(true)));
        assert_eq!(eval(Some(&json!("plain text"))), Some(json!(true)));
        assert_eq!(eval(Some(&json!("{{ }}"))), Some(json!(true)));
        assert!(evaluate(evaluator.as_ref(), Some(&json!([1])), &scope).is_err());
    }
}
