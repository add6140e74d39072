//! Per-node and global state addressed by dotted paths.
//!
//! This module defines [`StateStore`], the single owner of every piece of
//! mutable data an expression can read. Component states live in one JSON
//! object keyed by node id (the `$` tier), global state in another (the `$$`
//! tier), so a read-only [`Scope`] can borrow both without copying.
//!
//! # Paths
//!
//! Paths are split on `.`. Writes walk the path and create missing
//! intermediate objects; an intermediate that exists but is not an object is
//! replaced by an empty object. Reads walk the same way and return
//! `undefined` (`None`) as soon as a segment is missing, never an error.
//!
//! # Retired ids
//!
//! When a node is torn down its id is retired: its state is dropped and any
//! later write addressed to it (typically from a handler whose timer fired
//! after teardown) is discarded with a warning instead of resurrecting the
//! entry.
//!
//! # Example
//!
//! ```rust
//! use dynui::state::StateStore;
//! use serde_json::json;
//!
//! let mut store = StateStore::default();
//! store.update_state("profile.address.city", json!("Lyon"), Some("form"));
//! assert_eq!(
//!     store.get_state_value("profile.address.city", Some("form")),
//!     Some(json!("Lyon"))
//! );
//! assert_eq!(store.get_state_value("profile.phone", Some("form")), None);
//! ```

use super::snapshot::StateSnapshot;
use crate::domain::{DynUiError, Node, Result};
use crate::expression::{HostFunctions, Operand, Scope};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Component and global state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStore {
    /// Node id to that node's state. Always a JSON object.
    components: Value,

    /// Shared state. Always a JSON object.
    global: Value,

    /// Ids of torn-down nodes; writes to them are dropped.
    retired: HashSet<String>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl StateStore {
    /// Creates a store with the given initial global state and no component state.
    #[must_use]
    pub fn new(global: Map<String, Value>) -> Self {
        Self {
            components: Value::Object(Map::new()),
            global: Value::Object(global),
            retired: HashSet::new(),
        }
    }

    /// Seeds component state from every node's `defaultValue`.
    ///
    /// Walks all trees depth first, recording each id. A repeated id aborts
    /// with [`DynUiError::DuplicateId`] before anything is written, so a failed
    /// initialization leaves the store exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::DuplicateId`] for the first id seen twice.
    pub fn initialize(&mut self, roots: &[Node]) -> Result<()> {
        let _span = tracing::debug_span!("state_initialize", roots = roots.len()).entered();

        let mut seen = HashSet::new();
        let mut seeds = Vec::new();
        let mut duplicate = None;
        for root in roots {
            root.walk(&mut |node| {
                if duplicate.is_some() {
                    return;
                }
                if !seen.insert(node.id.as_str()) {
                    duplicate = Some(node.id.clone());
                    return;
                }
                if let Some(default) = node.default_value.as_ref().filter(|v| !v.is_null()) {
                    seeds.push((node.id.as_str(), default.clone()));
                }
            });
        }

        if let Some(id) = duplicate {
            tracing::error!(id = %id, "duplicate node id, aborting initialization");
            return Err(DynUiError::DuplicateId(id));
        }

        tracing::debug!(nodes = seen.len(), seeded = seeds.len(), "state initialized");
        for (id, state) in seeds {
            self.retired.remove(id);
            self.components_mut().insert(id.to_string(), state);
        }
        Ok(())
    }

    fn components_mut(&mut self) -> &mut Map<String, Value> {
        if !self.components.is_object() {
            self.components = Value::Object(Map::new());
        }
        let Value::Object(map) = &mut self.components else {
            unreachable!("components is always an object");
        };
        map
    }

    /// Replaces a node's entire state.
    pub fn set_component_state(&mut self, id: &str, state: Value) {
        if self.is_retired(id) {
            tracing::warn!(id = %id, "dropping state write for torn-down node");
            return;
        }
        tracing::trace!(id = %id, "component state replaced");
        self.components_mut().insert(id.to_string(), state);
    }

    /// A node's state, or an empty object when it has none.
    #[must_use]
    pub fn get_component_state(&self, id: &str) -> Value {
        self.component_state(id)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Borrowed view of a node's state, if any.
    #[must_use]
    pub fn component_state(&self, id: &str) -> Option<&Value> {
        self.components.get(id)
    }

    /// Writes `value` at the dotted `path`, in the node's state when `id` is
    /// given, else in global state. Missing intermediate objects are created.
    pub fn update_state(&mut self, path: &str, value: Value, id: Option<&str>) {
        let target = match id {
            Some(id) => {
                if self.is_retired(id) {
                    tracing::warn!(id = %id, path = %path, "dropping state write for torn-down node");
                    return;
                }
                self.components_mut()
                    .entry(id.to_string())
                    .or_insert_with(|| Value::Object(Map::new()))
            }
            None => &mut self.global,
        };

        let mut segments = path.split('.').peekable();
        let mut current = target;
        while let Some(segment) = segments.next() {
            if !current.is_object() {
                tracing::debug!(segment = %segment, path = %path, "replacing non-object level");
                *current = Value::Object(Map::new());
            }
            let Value::Object(map) = current else {
                return;
            };
            if segments.peek().is_none() {
                map.insert(segment.to_string(), value);
                break;
            }
            current = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        tracing::trace!(path = %path, id = ?id, "state updated");
    }

    /// Reads the value at the dotted `path`; `None` when any segment is missing.
    #[must_use]
    pub fn get_state_value(&self, path: &str, id: Option<&str>) -> Operand {
        let mut current = match id {
            Some(id) => self.component_state(id)?,
            None => &self.global,
        };
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// Drops a node's state and refuses further writes to it.
    pub fn retire(&mut self, id: &str) {
        self.components_mut().remove(id);
        self.retired.insert(id.to_string());
    }

    /// Accepts writes to a previously retired id again.
    pub fn revive(&mut self, id: &str) {
        self.retired.remove(id);
    }

    /// Whether writes to `id` are being dropped.
    #[must_use]
    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    /// All component states, keyed by node id (the `$` tier).
    #[must_use]
    pub const fn components(&self) -> &Value {
        &self.components
    }

    /// Global state (the `$$` tier).
    #[must_use]
    pub const fn global(&self) -> &Value {
        &self.global
    }

    /// Builds the read-only scope expressions see.
    #[must_use]
    pub fn scope<'a>(&'a self, extra: &'a Value, functions: &'a dyn HostFunctions) -> Scope<'a> {
        Scope::new(&self.components, &self.global, extra).with_functions(functions)
    }

    /// Copies out the current global and component state.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            global: self.global.as_object().cloned().unwrap_or_default(),
            components: self.components.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Replaces all state with a snapshot's contents. Retired ids stay retired.
    pub fn restore(&mut self, snapshot: StateSnapshot) {
        let StateSnapshot { global, mut components } = snapshot;
        components.retain(|id, _| !self.retired.contains(id));
        tracing::debug!(components = components.len(), "state restored from snapshot");
        self.global = Value::Object(global);
        self.components = Value::Object(components);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Vec<Node> {
        serde_json::from_value(json!([
            {
                "id": "form",
                "componentName": "Form",
                "defaultValue": { "submitted": false },
                "children": [
                    { "id": "name", "componentName": "Input", "defaultValue": "" },
                    { "id": "note", "componentName": "Text" }
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn initialize_seeds_defaults() {
        let mut store = StateStore::default();
        store.initialize(&tree()).unwrap();
        assert_eq!(store.get_component_state("form"), json!({ "submitted": false }));
        assert_eq!(store.component_state("name"), Some(&json!("")));
        assert_eq!(store.component_state("note"), None);
        assert_eq!(store.get_component_state("note"), json!({}));
    }

    #[test]
    fn duplicate_id_aborts_without_partial_commit() {
        let mut nodes = tree();
        let mut dup = Node::new("name", "Input");
        dup.default_value = Some(json!("dup"));
        nodes.push(dup);

        let mut store = StateStore::default();
        let before = store.clone();
        let err = store.initialize(&nodes).unwrap_err();
        assert!(matches!(err, DynUiError::DuplicateId(ref id) if id == "name"));
        assert_eq!(store, before);
    }

    #[test]
    fn update_state_targets_global_without_id() {
        let mut store = StateStore::default();
        store.update_state("user.name", json!("ada"), None);
        assert_eq!(store.global(), &json!({ "user": { "name": "ada" } }));
        assert_eq!(store.get_state_value("user.name", None), Some(json!("ada")));
        assert_eq!(store.get_state_value("user.name.first", None), None);
    }

    #[test]
    fn non_object_intermediates_are_replaced() {
        let mut store = StateStore::default();
        store.set_component_state("a", json!({ "x": 5 }));
        store.update_state("x.y", json!(1), Some("a"));
        assert_eq!(store.get_component_state("a"), json!({ "x": { "y": 1 } }));
    }

    #[test]
    fn retired_ids_drop_writes() {
        let mut store = StateStore::default();
        store.set_component_state("gone", json!(1));
        store.retire("gone");
        store.update_state("v", json!(2), Some("gone"));
        store.set_component_state("gone", json!(3));
        assert_eq!(store.component_state("gone"), None);

        store.revive("gone");
        store.update_state("v", json!(2), Some("gone"));
        assert_eq!(store.get_state_value("v", Some("gone")), Some(json!(2)));
    }
}
