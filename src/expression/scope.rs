//! The three-tier read-only scope every expression is evaluated against.
//!
//! | prefix | tier | contents |
//! |---|---|---|
//! | `$` | local | component states, keyed by node id |
//! | `$$` | global | shared module state |
//! | `$$$` | extra | injected context data and trusted utility functions |
//!
//! [`Scope`] only ever holds shared references, so nothing reachable through it
//! can be mutated: the read-only guarantee is deep by construction. The one
//! write-shaped entry point, [`Scope::assign`], exists so that evaluators have
//! somewhere to send assignment syntax, and it always refuses.
//!
//! Two paths under `$$$` are aliases rather than data: `$$$.context.globalState`
//! reads the global tier and `$$$.context.componentStates` reads the local tier.

use super::value::{self, Operand};
use super::ExpressionError;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Scope tier selected by a `$`-prefixed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Root {
    /// `$`: component states.
    Local,
    /// `$$`: global state.
    Global,
    /// `$$$`: extra context.
    Extra,
}

impl Root {
    /// Maps a reserved identifier onto its tier.
    #[must_use]
    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "$" => Some(Self::Local),
            "$$" => Some(Self::Global),
            "$$$" => Some(Self::Extra),
            _ => None,
        }
    }
}

/// Trusted functions reachable under `$$$`.
///
/// `path` is the dotted path after `$$$`, e.g. `["context", "utils", "updateState"]`.
/// Implementations return `None` when nothing is registered at that path.
pub trait HostFunctions {
    /// Invokes the function registered at `path`.
    fn call(&self, path: &[&str], args: &[Operand]) -> Option<Result<Operand, String>>;
}

/// Host with no functions at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHostFunctions;

impl HostFunctions for NoHostFunctions {
    fn call(&self, _path: &[&str], _args: &[Operand]) -> Option<Result<Operand, String>> {
        None
    }
}

/// A registered utility function.
pub type UtilityFn = Rc<dyn Fn(&[Operand]) -> Result<Operand, String>>;

/// Named utility functions supplied by the host program.
///
/// Registered names are dotted paths relative to `$$$`:
///
/// ```
/// use dynui::expression::{HostFunctions, Utilities};
/// use serde_json::json;
///
/// let mut utils = Utilities::default();
/// utils.register("format.price", |args| {
///     let cents = args.first().cloned().flatten().and_then(|v| v.as_f64()).unwrap_or(0.0);
///     Ok(Some(json!(format!("${:.2}", cents / 100.0))))
/// });
///
/// let result = utils.call(&["format", "price"], &[Some(json!(1999))]);
/// assert_eq!(result, Some(Ok(Some(json!("$19.99")))));
/// ```
#[derive(Clone, Default)]
pub struct Utilities {
    functions: HashMap<String, UtilityFn>,
}

impl Utilities {
    /// Registers `function` under the dotted `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Operand]) -> Result<Operand, String> + 'static,
    {
        self.functions.insert(name.into(), Rc::new(function));
    }

    /// Whether a function is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl HostFunctions for Utilities {
    fn call(&self, path: &[&str], args: &[Operand]) -> Option<Result<Operand, String>> {
        let function = self.functions.get(&path.join("."))?;
        Some(function(args))
    }
}

impl fmt::Debug for Utilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("Utilities").field("functions", &names).finish()
    }
}

/// Read-only view over component, global and extra state.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    local: &'a Value,
    global: &'a Value,
    extra: &'a Value,
    functions: &'a dyn HostFunctions,
}

impl<'a> Scope<'a> {
    /// Builds a scope with no host functions.
    #[must_use]
    pub fn new(local: &'a Value, global: &'a Value, extra: &'a Value) -> Self {
        Self {
            local,
            global,
            extra,
            functions: &NoHostFunctions,
        }
    }

    /// Exposes `functions` under `$$$`.
    #[must_use]
    pub fn with_functions(mut self, functions: &'a dyn HostFunctions) -> Self {
        self.functions = functions;
        self
    }

    /// Rewrites `$$$.context.globalState…` / `$$$.context.componentStates…`
    /// onto the tier they alias. Returns the tier and how many segments the
    /// alias consumed.
    #[must_use]
    pub fn resolve_alias(&self, root: Root, path: &[&str]) -> (Root, usize) {
        if root == Root::Extra && path.first() == Some(&"context") {
            match path.get(1) {
                Some(&"globalState") => return (Root::Global, 2),
                Some(&"componentStates") => return (Root::Local, 2),
                _ => {}
            }
        }
        (root, 0)
    }

    /// The value of a whole tier.
    ///
    /// `first_segment` is the next path segment, if any; the extra tier only
    /// materializes its `context` alias object when that segment is
    /// `"context"` or when the tier itself is requested.
    #[must_use]
    pub fn root_value(&self, root: Root, first_segment: Option<&str>) -> Cow<'a, Value> {
        match root {
            Root::Local => Cow::Borrowed(self.local),
            Root::Global => Cow::Borrowed(self.global),
            Root::Extra => match first_segment {
                Some(segment) if segment != "context" => Cow::Borrowed(self.extra),
                _ => Cow::Owned(self.materialize_extra()),
            },
        }
    }

    fn materialize_extra(&self) -> Value {
        let mut extra = match self.extra {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let mut context = match extra.remove("context") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        context.insert("globalState".to_string(), self.global.clone());
        context.insert("componentStates".to_string(), self.local.clone());
        extra.insert("context".to_string(), Value::Object(context));
        Value::Object(extra)
    }

    /// Lenient dotted-path lookup: any missing or non-object intermediate
    /// yields `undefined` rather than an error.
    #[must_use]
    pub fn lookup(&self, root: Root, path: &[&str]) -> Operand {
        let (root, skip) = self.resolve_alias(root, path);
        let rest = &path[skip..];
        let mut current = self.root_value(root, rest.first().copied());
        for segment in rest {
            current = value::step(current, segment)?;
        }
        Some(current.into_owned())
    }

    /// Whether the local tier has a top-level entry called `name`.
    ///
    /// Bare identifiers in expressions resolve against the local tier.
    #[must_use]
    pub fn has_local(&self, name: &str) -> bool {
        self.local.get(name).is_some()
    }

    /// Invokes a host function under `$$$`.
    #[must_use]
    pub fn call(&self, path: &[&str], args: &[Operand]) -> Option<Result<Operand, String>> {
        self.functions.call(path, args)
    }

    /// Rejects a write attempted by `expression`.
    ///
    /// # Errors
    ///
    /// Always returns [`ExpressionError::ReadOnlyScope`].
    pub fn assign(&self, expression: &str) -> Result<(), ExpressionError> {
        tracing::warn!(expression = %expression, "expression attempted to write to its scope");
        Err(ExpressionError::ReadOnlyScope {
            expression: expression.to_string(),
        })
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("local", self.local)
            .field("global", self.global)
            .field("extra", self.extra)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_walks_each_tier() {
        let local = json!({ "form": { "email": "a@b.c" } });
        let global = json!({ "user": { "roles": ["admin"] } });
        let extra = json!({ "locale": "en" });
        let scope = Scope::new(&local, &global, &extra);

        assert_eq!(scope.lookup(Root::Local, &["form", "email"]), Some(json!("a@b.c")));
        assert_eq!(scope.lookup(Root::Global, &["user", "roles", "0"]), Some(json!("admin")));
        assert_eq!(scope.lookup(Root::Extra, &["locale"]), Some(json!("en")));
        assert_eq!(scope.lookup(Root::Local, &["form", "missing", "deeper"]), None);
    }

    #[test]
    fn context_aliases_point_at_state_tiers() {
        let local = json!({ "a": 1 });
        let global = json!({ "b": 2 });
        let extra = json!({});
        let scope = Scope::new(&local, &global, &extra);

        assert_eq!(scope.lookup(Root::Extra, &["context", "globalState", "b"]), Some(json!(2)));
        assert_eq!(scope.lookup(Root::Extra, &["context", "componentStates", "a"]), Some(json!(1)));
        assert_eq!(
            scope.lookup(Root::Extra, &["context"]),
            Some(json!({ "globalState": { "b": 2 }, "componentStates": { "a": 1 } }))
        );
    }

    #[test]
    fn assign_always_fails_with_expression_text() {
        let empty = json!({});
        let scope = Scope::new(&empty, &empty, &empty);
        let err = scope.assign("$.a = 1").unwrap_err();
        assert_eq!(err, ExpressionError::ReadOnlyScope { expression: "$.a = 1".to_string() });
        assert!(err.to_string().contains("$.a = 1"));
    }
}
