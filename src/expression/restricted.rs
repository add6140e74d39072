//! Grammar-restricted backend for hosts that forbid runtime compilation.
//!
//! Works directly on the expression text by splitting at top-level operators
//! (outside string literals and outside `(…)`/`[…]` nesting):
//!
//! 1. strip one pair of enclosing parentheses, repeatedly;
//! 2. split on `||`, then on `&&`, short-circuiting left to right and
//!    returning the deciding operand;
//! 3. split at the last equality operator, else at the last relational one;
//! 4. a leading `!` negates the rest;
//! 5. anything else is an operand: a literal, or a dotted path from `$`,
//!    `$$`, `$$$` or a bare local identifier, optionally ending in a method
//!    call whose arguments are all literals.
//!
//! Operands outside that grammar are not an error: the raw operand text is
//! returned and a warning logged. Failures while evaluating inside the grammar
//! (a utility reporting an error, calling something that is not a method)
//! evaluate to `false`, also with a warning. Only an attempted write to the
//! scope is reported as an error.

use super::parser::parse_literal;
use super::scope::{Root, Scope};
use super::value::{self, CompareOp, Operand};
use super::{Evaluator, ExpressionError};
use serde_json::Value;
use std::cell::Cell;

/// Deepest recursion the walker allows before giving up.
const MAX_DEPTH: usize = 256;

/// Evaluator for the restricted grammar. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestrictedEvaluator;

impl Evaluator for RestrictedEvaluator {
    fn name(&self) -> &'static str {
        "restricted"
    }

    fn evaluate_source(&self, source: &str, scope: &Scope<'_>) -> Result<Operand, ExpressionError> {
        let source = source.trim();
        if contains_assignment(source) {
            scope.assign(source)?;
        }
        let walker = Walker {
            scope,
            source,
            depth: Cell::new(0),
        };
        match walker.expression(source) {
            Ok(value) => Ok(value),
            Err(message) => {
                tracing::warn!(expression = %source, error = %message, "restricted evaluation failed, using false");
                Ok(Some(Value::Bool(false)))
            }
        }
    }
}

struct Walker<'s, 'a> {
    scope: &'s Scope<'a>,
    source: &'s str,
    depth: Cell<usize>,
}

impl Walker<'_, '_> {
    fn expression(&self, text: &str) -> Result<Operand, String> {
        let depth = self.depth.get() + 1;
        if depth > MAX_DEPTH {
            return Err(format!("expression nests deeper than {MAX_DEPTH} levels"));
        }
        self.depth.set(depth);
        let result = self.walk(text);
        self.depth.set(depth - 1);
        result
    }

    fn walk(&self, text: &str) -> Result<Operand, String> {
        let text = strip_parens(text.trim());

        let alternatives = split_top_level(text, "||");
        if alternatives.len() > 1 {
            let mut last = None;
            for part in alternatives {
                last = self.expression(part)?;
                if value::truthy(&last) {
                    break;
                }
            }
            return Ok(last);
        }

        let conjuncts = split_top_level(text, "&&");
        if conjuncts.len() > 1 {
            let mut last = None;
            for part in conjuncts {
                last = self.expression(part)?;
                if !value::truthy(&last) {
                    break;
                }
            }
            return Ok(last);
        }

        let comparison = last_top_level(text, &CompareOp::EQUALITY).or_else(|| last_top_level(text, &CompareOp::RELATIONAL));
        if let Some((at, symbol, op)) = comparison {
            let left = self.expression(&text[..at])?;
            let right = self.expression(&text[at + symbol.len()..])?;
            return Ok(Some(Value::Bool(value::compare(op, &left, &right))));
        }

        let mut negations = 0usize;
        let mut rest = text;
        while let Some(stripped) = rest.strip_prefix('!') {
            negations += 1;
            rest = stripped.trim_start();
        }
        if negations > 0 {
            let inner = self.expression(rest)?;
            return Ok(Some(Value::Bool(value::truthy(&inner) == (negations % 2 == 0))));
        }

        self.operand(text)
    }

    fn operand(&self, text: &str) -> Result<Operand, String> {
        if let Some(literal) = parse_literal(text) {
            return Ok(literal);
        }
        match parse_path(text) {
            Some(path) => self.resolve(&path),
            None => {
                tracing::warn!(
                    operand = %text,
                    expression = %self.source,
                    "operand outside the restricted grammar, returning raw text"
                );
                Ok(Some(Value::String(text.to_string())))
            }
        }
    }

    fn resolve(&self, path: &PathExpr<'_>) -> Result<Operand, String> {
        let (root, segments) = match Root::from_ident(path.segments[0]) {
            Some(root) => (root, &path.segments[1..]),
            None => (Root::Local, &path.segments[..]),
        };

        let Some(args) = &path.call else {
            return Ok(self.scope.lookup(root, segments));
        };

        if root == Root::Extra {
            if let Some(result) = self.scope.call(segments, args) {
                return result.map_err(|message| format!("utility `{}` failed: {message}", segments.join(".")));
            }
        }

        let Some((method, receiver_path)) = segments.split_last() else {
            return Err(format!("`{}` is not a function", path.segments[0]));
        };
        match self.scope.lookup(root, receiver_path) {
            None | Some(Value::Null) => Ok(None),
            Some(receiver) => match value::call_method(&receiver, method, args) {
                Some(result) => result,
                None => Err(format!("{method} is not a function")),
            },
        }
    }
}

/// A dotted path with an optional trailing literal-argument call.
struct PathExpr<'t> {
    segments: Vec<&'t str>,
    call: Option<Vec<Operand>>,
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars
        .next()
        .is_some_and(|c| c == '$' || c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '$' || c == '_' || c.is_alphanumeric())
}

fn parse_path(text: &str) -> Option<PathExpr<'_>> {
    let (callee, call) = match text.strip_suffix(')') {
        Some(without_close) => {
            let open = matching_open(text)?;
            let args_text = &without_close[open + 1..];
            let args = if args_text.trim().is_empty() {
                Vec::new()
            } else {
                split_top_level(args_text, ",")
                    .into_iter()
                    .map(|arg| parse_literal(arg.trim()))
                    .collect::<Option<Vec<_>>>()?
            };
            let callee = &text[..open];
            (callee.strip_suffix("?.").unwrap_or(callee), Some(args))
        }
        None => (text, None),
    };

    let segments = callee
        .split('.')
        .map(|segment| segment.trim().strip_suffix('?').unwrap_or(segment.trim()))
        .collect::<Vec<_>>();
    if segments.iter().all(|s| is_identifier(s)) {
        Some(PathExpr { segments, call })
    } else {
        None
    }
}

/// Byte offset of the `(` matching the final `)` of `text`.
fn matching_open(text: &str) -> Option<usize> {
    let positions = top_level_scan(text, &[]);
    positions.open_of_last_close
}

struct Scan<'o> {
    matches: Vec<(usize, &'o str)>,
    open_of_last_close: Option<usize>,
    balanced: bool,
}

/// Walks `text` tracking string literals and bracket depth, collecting every
/// occurrence of `ops` at depth zero.
fn top_level_scan<'o>(text: &str, ops: &[&'o str]) -> Scan<'o> {
    let bytes = text.as_bytes();
    let mut matches = Vec::new();
    let mut opens: Vec<usize> = Vec::new();
    let mut open_of_last_close = None;
    let mut balanced = true;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' | b'[' => opens.push(i),
            b')' | b']' => {
                let open = opens.pop();
                if open.is_none() {
                    balanced = false;
                }
                open_of_last_close = open;
            }
            _ if opens.is_empty() => {
                if let Some(op) = ops.iter().find(|op| bytes[i..].starts_with(op.as_bytes())) {
                    matches.push((i, *op));
                    i += op.len();
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    Scan {
        matches,
        open_of_last_close,
        balanced: balanced && opens.is_empty() && quote.is_none(),
    }
}

fn split_top_level<'t>(text: &'t str, op: &str) -> Vec<&'t str> {
    let scan = top_level_scan(text, &[op]);
    if !scan.balanced {
        return vec![text];
    }
    let mut parts = Vec::with_capacity(scan.matches.len() + 1);
    let mut start = 0;
    for (at, matched) in scan.matches {
        parts.push(&text[start..at]);
        start = at + matched.len();
    }
    parts.push(&text[start..]);
    parts
}

fn last_top_level(text: &str, table: &[(&'static str, CompareOp)]) -> Option<(usize, &'static str, CompareOp)> {
    let symbols: Vec<&'static str> = table.iter().map(|(symbol, _)| *symbol).collect();
    let scan = top_level_scan(text, &symbols);
    if !scan.balanced {
        return None;
    }
    let (at, symbol) = scan.matches.last().copied()?;
    let op = CompareOp::from_symbol(symbol)?;
    Some((at, symbol, op))
}

/// Removes parentheses that enclose the whole of `text`.
fn strip_parens(mut text: &str) -> &str {
    while text.starts_with('(') && text.ends_with(')') && matching_open(text) == Some(0) {
        let scan = top_level_scan(text, &[]);
        if !scan.balanced {
            break;
        }
        text = text[1..text.len() - 1].trim();
    }
    text
}

/// Whether `text` contains an assignment or update operator outside string literals.
fn contains_assignment(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'=' => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                let part_of_comparison = matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) || matches!(next, Some(b'=' | b'>'));
                if !part_of_comparison {
                    return true;
                }
            }
            b'+' | b'-' if bytes.get(i + 1) == Some(&b) => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Utilities;
    use serde_json::json;

    fn eval(source: &str, local: &Value) -> Result<Operand, ExpressionError> {
        let empty = json!({});
        let scope = Scope::new(local, &empty, &empty);
        RestrictedEvaluator.evaluate_source(source, &scope)
    }

    #[test]
    fn splitting_respects_strings_and_parens() {
        let local = json!({ "a": "x || y", "b": false });
        assert_eq!(eval("$.a == 'x || y'", &local), Ok(Some(json!(true))));
        assert_eq!(eval("($.b || $.a) && ($.b == false)", &local), Ok(Some(json!(true))));
        assert_eq!(split_top_level("f(a || b) || c", "||"), vec!["f(a || b) ", " c"]);
    }

    #[test]
    fn negation_runs_do_not_recurse() {
        let local = json!({ "flag": true });
        let odd = format!("{}$.flag", "!".repeat(10_001));
        let even = format!("{}$.flag", "! ".repeat(10_000));
        assert_eq!(eval(&odd, &local), Ok(Some(json!(false))));
        assert_eq!(eval(&even, &local), Ok(Some(json!(true))));
    }

    #[test]
    fn oversized_nesting_evaluates_to_false() {
        let local = json!({ "flag": true });
        let chain = vec!["$.flag"; 1_000].join(" == ");
        let parens = format!("{}$.flag{}", "(!".repeat(1_000), ")".repeat(1_000));
        assert_eq!(eval(&chain, &local), Ok(Some(json!(false))));
        assert_eq!(eval(&parens, &local), Ok(Some(json!(false))));
        assert_eq!(eval(&format!("{}$.flag{}", "(".repeat(300), ")".repeat(300)), &local), Ok(Some(json!(true))));
    }

    #[test]
    fn unbalanced_parens_are_never_split() {
        assert_eq!(split_top_level("($.a || $.b", "||"), vec!["($.a || $.b"]);
        assert_eq!(eval("($.a || $.b", &json!({})), Ok(Some(json!("($.a || $.b"))));
    }

    #[test]
    fn unknown_operand_shape_returns_raw_text() {
        let local = json!({ "n": 2 });
        assert_eq!(eval("$.n + 1", &local), Ok(Some(json!("$.n + 1"))));
        assert_eq!(eval("typeof $.n", &local), Ok(Some(json!("typeof $.n"))));
    }

    #[test]
    fn method_call_with_literal_arguments() {
        let local = json!({ "email": "me@example.com" });
        assert_eq!(eval("$.email.includes('@')", &local), Ok(Some(json!(true))));
        assert_eq!(eval("$.email?.endsWith(\".org\")", &local), Ok(Some(json!(false))));
        assert_eq!(eval("$.missing?.includes('@')", &local), Ok(None));
        assert_eq!(eval("$.email.includes($.other)", &local), Ok(Some(json!("$.email.includes($.other)"))));
    }

    #[test]
    fn internal_failures_coerce_to_false() {
        let mut utils = Utilities::default();
        utils.register("boom", |_| Err("nope".to_string()));
        let empty = json!({});
        let local = json!({ "n": 1 });
        let scope = Scope::new(&local, &empty, &empty).with_functions(&utils);
        assert_eq!(RestrictedEvaluator.evaluate_source("$$$.boom()", &scope), Ok(Some(json!(false))));
        assert_eq!(RestrictedEvaluator.evaluate_source("$.n.frobnicate()", &scope), Ok(Some(json!(false))));
    }

    #[test]
    fn assignment_is_rejected() {
        let local = json!({ "a": 1 });
        assert!(matches!(eval("$.a = 2", &local), Err(ExpressionError::ReadOnlyScope { .. })));
        assert!(matches!(eval("$.a++", &local), Err(ExpressionError::ReadOnlyScope { .. })));
        assert_eq!(eval("$.a >= 1 && $.a !== 2", &local), Ok(Some(json!(true))));
        assert_eq!(eval("$.a == '='", &local), Ok(Some(json!(false))));
    }

    #[test]
    fn bare_identifiers_and_negation() {
        let local = json!({ "flag": true, "name": "" });
        assert_eq!(eval("flag", &local), Ok(Some(json!(true))));
        assert_eq!(eval("!!name", &local), Ok(Some(json!(false))));
        assert_eq!(eval("unknown", &local), Ok(None));
        assert_eq!(eval("!(flag && name)", &local), Ok(Some(json!(true))));
    }
}
