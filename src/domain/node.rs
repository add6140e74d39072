//! Schema node model.
//!
//! A schema is a tree of [`Node`]s. Each node names the component that renders
//! it, carries static props, and declares everything dynamic about it through
//! [`ValueCondition`]s: bound prop values, visibility, and the payloads of
//! `custom` event handlers.
//!
//! Field names follow the JSON wire format (`componentName`, `defaultValue`,
//! `eventExecutionMode`, `visibleOption`), so a schema produced by any
//! existing loader deserializes directly.
//!
//! # Example
//!
//! ```
//! use dynui::domain::{Node, ValueCondition};
//!
//! let node: Node = serde_json::from_value(serde_json::json!({
//!     "id": "email_error",
//!     "componentName": "BaseText",
//!     "visibleOption": {
//!         "mode": "parse",
//!         "condition": "!$.email_field.includes('@')"
//!     }
//! }))
//! .unwrap();
//!
//! assert!(matches!(node.visible_option, Some(ValueCondition::Mode(_))));
//! ```

use crate::app::actions::Action;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// One entry in the UI schema tree.
///
/// Parents own their children exclusively; ids form one flat namespace across
/// the whole tree and must be unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Globally unique node id.
    pub id: String,

    /// Component the rendering collaborator should instantiate.
    pub component_name: String,

    /// Static props, passed through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,

    /// Child nodes, in render order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,

    /// Props whose values are computed from state on every render pass.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, ValueCondition>,

    /// Initial component state; also the value restored when the node hides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    /// Event name to one handler or an ordered list of handlers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, HandlerBinding>,

    /// How a list of handlers is scheduled. Falls back to the context default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_execution_mode: Option<ExecutionMode>,

    /// Visibility condition. Absent means always visible.
    #[serde(
        default,
        alias = "visibleOptions",
        skip_serializing_if = "Option::is_none"
    )]
    pub visible_option: Option<ValueCondition>,
}

impl Node {
    /// Creates a bare node with no props, children or dynamic behavior.
    pub fn new(id: impl Into<String>, component_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component_name: component_name.into(),
            props: Map::new(),
            children: Vec::new(),
            bindings: BTreeMap::new(),
            default_value: None,
            events: BTreeMap::new(),
            event_execution_mode: None,
            visible_option: None,
        }
    }

    /// Visits this node and every descendant, depth first, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Finds a node by id within this subtree.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Mutable counterpart of [`Node::find`].
    pub fn find_mut(&mut self, id: &str) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Collects the ids of this node and all of its descendants.
    #[must_use]
    pub fn subtree_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.walk(&mut |node| ids.push(node.id.clone()));
        ids
    }
}

/// A configured value that is either a literal or a `{mode, condition}` pair.
///
/// Any object carrying a `mode` key deserializes as a condition; everything
/// else is a literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValueCondition {
    /// Needs the resolver: either read verbatim or parsed as an expression.
    Mode(ModeCondition),
    /// Returned unchanged.
    Literal(Value),
}

impl<'de> Deserialize<'de> for ValueCondition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Object(ref map) if map.contains_key("mode") => ModeCondition::deserialize(value)
                .map(Self::Mode)
                .map_err(de::Error::custom),
            other => Ok(Self::Literal(other)),
        }
    }
}

impl ValueCondition {
    /// Shorthand for a `parse` condition over a single expression.
    pub fn parse(condition: impl Into<String>) -> Self {
        Self::Mode(ModeCondition {
            mode: ValueMode::Parse,
            condition: Value::String(condition.into()),
        })
    }

    /// Shorthand for a `parse` condition over alternatives joined with `||`.
    pub fn parse_any<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Mode(ModeCondition {
            mode: ValueMode::Parse,
            condition: Value::Array(
                alternatives
                    .into_iter()
                    .map(|s| Value::String(s.into()))
                    .collect(),
            ),
        })
    }

    /// Shorthand for a `read` condition returning `value` verbatim.
    #[must_use]
    pub fn read(value: Value) -> Self {
        Self::Mode(ModeCondition {
            mode: ValueMode::Read,
            condition: value,
        })
    }
}

/// `{mode, condition}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeCondition {
    /// How `condition` is interpreted.
    pub mode: ValueMode,
    /// Expression string, list of alternatives, or (in read mode) any value.
    #[serde(default)]
    pub condition: Value,
}

impl ModeCondition {
    /// Condition text as the resolver sees it, used in error messages.
    #[must_use]
    pub fn condition_text(&self) -> String {
        match &self.condition {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" || "),
            other => other.to_string(),
        }
    }
}

/// Interpretation of a [`ModeCondition`].
///
/// Mode names are case-insensitive. Only `read` returns the condition
/// verbatim; every other name is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueMode {
    /// Return the condition verbatim, never evaluating it.
    Read,
    /// Evaluate the condition as an expression.
    Parse,
}

impl<'de> Deserialize<'de> for ValueMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        if name.eq_ignore_ascii_case("read") {
            return Ok(Self::Read);
        }
        if !name.eq_ignore_ascii_case("parse") {
            tracing::warn!(mode = %name, "unknown value mode, evaluating condition");
        }
        Ok(Self::Parse)
    }
}

/// Scheduling policy for a list of handlers bound to one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Every handler's delay is measured from the triggering instant.
    #[default]
    #[serde(alias = "PARALLEL", alias = "Parallel")]
    Parallel,
    /// Handlers run strictly in order, each waiting for the previous one's
    /// delay, execution and `waitAfter`.
    #[serde(alias = "SEQUENTIAL", alias = "Sequential")]
    Sequential,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parallel => f.write_str("parallel"),
            Self::Sequential => f.write_str("sequential"),
        }
    }
}

/// One action bound to a UI event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handler {
    /// Action looked up in the fixed action table.
    pub action: Action,

    /// Action-specific payload.
    #[serde(default)]
    pub payload: Value,

    /// Node whose state the action writes to; defaults to the emitting node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Milliseconds to wait before the handler starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,

    /// Milliseconds to wait after the handler ran (sequential mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after: Option<u64>,
}

impl Handler {
    /// Creates a handler with no target, delay or post-wait.
    #[must_use]
    pub fn new(action: Action, payload: Value) -> Self {
        Self {
            action,
            payload,
            target: None,
            delay: None,
            wait_after: None,
        }
    }

    /// Sets the start delay in milliseconds.
    #[must_use]
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = Some(delay_ms);
        self
    }

    /// Sets the post-execution wait in milliseconds.
    #[must_use]
    pub fn with_wait_after(mut self, wait_ms: u64) -> Self {
        self.wait_after = Some(wait_ms);
        self
    }

    /// Redirects state writes to another node.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// An event bound to a single handler or an ordered list of handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandlerBinding {
    /// Exactly one handler.
    Single(Handler),
    /// Handlers in declaration order.
    List(Vec<Handler>),
}

impl HandlerBinding {
    /// The bound handlers in declaration order.
    #[must_use]
    pub fn handlers(&self) -> &[Handler] {
        match self {
            Self::Single(handler) => std::slice::from_ref(handler),
            Self::List(handlers) => handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_full_node() {
        let node: Node = serde_json::from_value(json!({
            "id": "parallel_button",
            "componentName": "BaseButton",
            "props": { "text": "go" },
            "defaultValue": { "count": 0 },
            "eventExecutionMode": "sequential",
            "events": {
                "click": [
                    { "action": "updateState", "payload": { "path": "log_1", "value": "a" } },
                    { "action": "showToast", "payload": { "title": "done" }, "delay": 800, "waitAfter": 100 }
                ]
            },
            "bindings": {
                "disabled": { "mode": "parse", "condition": ["$.a", "$.b"] },
                "label": "static"
            },
            "children": [{ "id": "child", "componentName": "BaseText" }]
        }))
        .unwrap();

        assert_eq!(node.event_execution_mode, Some(ExecutionMode::Sequential));
        let click = node.events["click"].handlers();
        assert_eq!(click.len(), 2);
        assert_eq!(click[0].action, Action::UpdateState);
        assert_eq!(click[1].delay, Some(800));
        assert_eq!(click[1].wait_after, Some(100));
        assert!(matches!(node.bindings["label"], ValueCondition::Literal(Value::String(_))));
        assert!(matches!(node.bindings["disabled"], ValueCondition::Mode(_)));
        assert_eq!(node.subtree_ids(), vec!["parallel_button", "child"]);
    }

    #[test]
    fn accepts_visible_options_alias_and_uppercase_modes() {
        let node: Node = serde_json::from_value(json!({
            "id": "a",
            "componentName": "X",
            "visibleOptions": { "mode": "READ", "condition": false }
        }))
        .unwrap();

        assert_eq!(
            node.visible_option,
            Some(ValueCondition::Mode(ModeCondition {
                mode: ValueMode::Read,
                condition: Value::Bool(false),
            }))
        );
    }

    #[test]
    fn unknown_modes_are_evaluated_not_literal() {
        for mode in ["path", "pasre", "Parse"] {
            let condition: ValueCondition =
                serde_json::from_value(json!({ "mode": mode, "condition": "$.x === 1" })).unwrap();
            assert_eq!(condition, ValueCondition::parse("$.x === 1"), "{mode}");
        }
    }

    #[test]
    fn mode_must_be_a_string() {
        let err = serde_json::from_value::<ValueCondition>(json!({ "mode": 3, "condition": true }));
        assert!(err.is_err());
        let literal: ValueCondition = serde_json::from_value(json!({ "condition": true })).unwrap();
        assert!(matches!(literal, ValueCondition::Literal(Value::Object(_))));
    }

    #[test]
    fn single_handler_binding() {
        let binding: HandlerBinding =
            serde_json::from_value(json!({ "action": "navigateBack" })).unwrap();
        assert_eq!(binding.handlers().len(), 1);
        assert_eq!(binding.handlers()[0].action, Action::NavigateBack);
    }

    #[test]
    fn condition_text_joins_alternatives() {
        let cond = ModeCondition {
            mode: ValueMode::Parse,
            condition: json!(["$.a > 1", "$$.b"]),
        };
        assert_eq!(cond.condition_text(), "$.a > 1 || $$.b");
    }
}
