//! Value condition resolution.
//!
//! A [`ValueCondition`] is either a literal, returned unchanged, or a
//! `{mode, condition}` pair. `read` hands the condition back verbatim without
//! ever touching the evaluator, so arrays, objects and even text that looks
//! like `{{ … }}` pass straight through. `parse` wraps the condition in
//! delimiters (joining array alternatives with `||`) and evaluates it.

use super::context::UiContext;
use crate::domain::{DynUiError, ModeCondition, Result, ValueCondition, ValueMode};
use crate::expression::{self, Evaluator, Operand, Scope};
use serde_json::Value;

/// Resolves `condition` against `scope` with `evaluator`.
///
/// # Errors
///
/// Returns [`DynUiError::Resolve`] carrying the original condition text when
/// the evaluator fails. A failure is never replaced by a default value here;
/// callers decide.
///
/// # Example
///
/// ```
/// use dynui::app::resolve;
/// use dynui::domain::ValueCondition;
/// use dynui::expression::{EvaluatorKind, Scope};
/// use serde_json::json;
///
/// let empty = json!({});
/// let scope = Scope::new(&empty, &empty, &empty);
/// let evaluator = EvaluatorKind::Unrestricted.build();
///
/// let read = ValueCondition::read(json!("{{ 1+1 }}"));
/// assert_eq!(resolve(evaluator.as_ref(), &read, &scope)?, Some(json!("{{ 1+1 }}")));
///
/// let parse = ValueCondition::parse("1+1");
/// assert_eq!(resolve(evaluator.as_ref(), &parse, &scope)?, Some(json!(2)));
/// # Ok::<(), dynui::DynUiError>(())
/// ```
pub fn resolve(evaluator: &dyn Evaluator, condition: &ValueCondition, scope: &Scope<'_>) -> Result<Operand> {
    let mode_condition = match condition {
        ValueCondition::Literal(value) => return Ok(Some(value.clone())),
        ValueCondition::Mode(mode_condition) => mode_condition,
    };
    match mode_condition.mode {
        ValueMode::Read => Ok(Some(mode_condition.condition.clone())),
        ValueMode::Parse => {
            let evaluated = match delimited(mode_condition) {
                Some(text) => expression::evaluate_str(evaluator, &text, scope),
                None => expression::evaluate(evaluator, Some(&mode_condition.condition), scope),
            };
            evaluated.map_err(|source| {
                tracing::debug!(condition = %mode_condition.condition_text(), error = %source, "resolution failed");
                DynUiError::Resolve {
                    condition: mode_condition.condition_text(),
                    source,
                }
            })
        }
    }
}

/// The condition in `{{ … }}` form, or `None` for pre-typed conditions.
fn delimited(condition: &ModeCondition) -> Option<String> {
    match &condition.condition {
        Value::String(text) => Some(wrap(text)),
        Value::Array(items) => {
            let alternatives = items
                .iter()
                .map(|item| match item {
                    Value::String(text) => strip_delimiters(text).to_string(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>();
            Some(wrap(&alternatives.join(" || ")))
        }
        _ => None,
    }
}

fn is_delimited(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("{{") && trimmed.ends_with("}}")
}

fn wrap(text: &str) -> String {
    if is_delimited(text) {
        text.to_string()
    } else {
        format!("{{{{ {text} }}}}")
    }
}

fn strip_delimiters(text: &str) -> &str {
    let trimmed = text.trim();
    if is_delimited(trimmed) {
        trimmed[2..trimmed.len() - 2].trim()
    } else {
        trimmed
    }
}

impl UiContext {
    /// Resolves `condition` against the context's current state.
    ///
    /// Writes and emits requested by trusted utilities during evaluation are
    /// applied once it returns.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::Resolve`] when evaluation fails.
    pub fn resolve(&self, condition: &ValueCondition) -> Result<Operand> {
        self.with_scope(|scope| resolve(self.evaluator.as_ref(), condition, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{EvaluatorKind, ExpressionError};
    use serde_json::json;

    #[test]
    fn literals_and_read_mode_skip_evaluation() {
        let empty = json!({});
        let scope = Scope::new(&empty, &empty, &empty);
        let evaluator = EvaluatorKind::Unrestricted.build();

        let literal = ValueCondition::Literal(json!([1, 2]));
        assert_eq!(resolve(evaluator.as_ref(), &literal, &scope).unwrap(), Some(json!([1, 2])));

        let read = ValueCondition::read(json!({ "a": "{{ $.broken( }}" }));
        assert_eq!(
            resolve(evaluator.as_ref(), &read, &scope).unwrap(),
            Some(json!({ "a": "{{ $.broken( }}" }))
        );
    }

    #[test]
    fn parse_mode_joins_alternatives() {
        let local = json!({ "a": { "on": false }, "b": { "on": true } });
        let empty = json!({});
        let scope = Scope::new(&local, &empty, &empty);
        let evaluator = EvaluatorKind::Restricted.build();

        let any = ValueCondition::parse_any(["$.a.on", "{{ $.b.on }}"]);
        assert_eq!(resolve(evaluator.as_ref(), &any, &scope).unwrap(), Some(json!(true)));

        let already = ValueCondition::parse("{{ $.a.on }}");
        assert_eq!(resolve(evaluator.as_ref(), &already, &scope).unwrap(), Some(json!(false)));
    }

    #[test]
    fn unrecognized_mode_name_is_evaluated() {
        let local = json!({ "x": 1 });
        let empty = json!({});
        let scope = Scope::new(&local, &empty, &empty);
        let evaluator = EvaluatorKind::Unrestricted.build();

        let condition: ValueCondition =
            serde_json::from_value(json!({ "mode": "path", "condition": "$.x === 1" })).unwrap();
        assert_eq!(resolve(evaluator.as_ref(), &condition, &scope).unwrap(), Some(json!(true)));
    }

    #[test]
    fn failures_carry_condition_text() {
        let empty = json!({});
        let scope = Scope::new(&empty, &empty, &empty);
        let evaluator = EvaluatorKind::Unrestricted.build();

        let err = resolve(evaluator.as_ref(), &ValueCondition::parse("$.a.b.c"), &scope).unwrap_err();
        match err {
            DynUiError::Resolve { condition, source } => {
                assert_eq!(condition, "$.a.b.c");
                assert!(matches!(source, ExpressionError::Type { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
