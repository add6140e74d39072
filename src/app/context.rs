//! The context object every engine operation runs against.
//!
//! This module defines [`UiContext`], the explicit owner of everything a page
//! of schema-driven UI needs at runtime: the state store, the event bus, the
//! chosen evaluator backend, the navigation/notification collaborator, the
//! trusted utilities exposed under `$$$`, the node registry, and the
//! cancellation tokens of pending handlers. Nothing lives in a process-wide
//! singleton; two contexts never share state.
//!
//! # Architecture
//!
//! `UiContext` is single-threaded. Interior mutability is `RefCell` based and
//! every borrow is scoped to one synchronous step, never held across an
//! `.await`. Expression evaluation borrows the store immutably; writes a
//! trusted utility requests during evaluation are collected as effects and
//! applied once the evaluation has returned and the borrow is gone.
//!
//! The behavior is split across sibling modules, each adding an `impl` block:
//!
//! - [`super::resolver`]: value condition resolution
//! - [`super::visibility`]: visibility and cascading reset
//! - [`super::handler`]: the action table
//! - [`super::scheduler`]: named dispatch, timers and teardown
//!
//! # Example
//!
//! ```rust
//! use dynui::app::UiContext;
//! use dynui::expression::EvaluatorKind;
//! use dynui::schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::from_json_str(r#"[
//!     { "id": "form", "componentName": "Form", "defaultValue": { "email": "" } }
//! ]"#)?;
//! let context = UiContext::builder()
//!     .with_evaluator(EvaluatorKind::Restricted)
//!     .build(schema)?;
//!
//! context.update_state("email", json!("me@example.com"), Some("form"));
//! assert_eq!(context.get_component_state("form"), json!({ "email": "me@example.com" }));
//! # Ok::<(), dynui::DynUiError>(())
//! ```

use crate::bus::{EventBus, SubscriptionId};
use crate::domain::{ExecutionMode, Node, Result};
use crate::expression::value::{self, Operand};
use crate::expression::{Evaluator, EvaluatorKind, HostFunctions, Scope, Utilities};
use crate::infrastructure::{Platform, TracingPlatform};
use crate::schema::{NodeRegistry, Schema};
use crate::state::{StateSnapshot, StateStore};
use serde_json::{Map, Value};
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Everything a page of schema-driven UI runs against.
pub struct UiContext {
    pub(super) store: RefCell<StateStore>,
    pub(super) bus: EventBus,
    pub(super) evaluator: Box<dyn Evaluator>,
    pub(super) platform: Box<dyn Platform>,
    pub(super) utilities: Utilities,
    pub(super) extra_context: Value,
    pub(super) registry: RefCell<NodeRegistry>,
    pub(super) default_mode: ExecutionMode,
    pub(super) page_token: CancellationToken,
    pub(super) node_tokens: RefCell<HashMap<String, CancellationToken>>,
    pub(super) visibility: RefCell<HashMap<String, bool>>,
}

/// Configures and builds a [`UiContext`].
pub struct UiContextBuilder {
    evaluator: Box<dyn Evaluator>,
    platform: Box<dyn Platform>,
    utilities: Utilities,
    extra_context: Map<String, Value>,
    global_state: Map<String, Value>,
    default_mode: ExecutionMode,
}

impl Default for UiContextBuilder {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorKind::default().build(),
            platform: Box::new(TracingPlatform),
            utilities: Utilities::default(),
            extra_context: Map::new(),
            global_state: Map::new(),
            default_mode: ExecutionMode::default(),
        }
    }
}

impl UiContextBuilder {
    /// Selects the evaluator backend the host can run.
    #[must_use]
    pub fn with_evaluator(self, kind: EvaluatorKind) -> Self {
        self.with_custom_evaluator(kind.build())
    }

    /// Installs an evaluator implementation directly.
    #[must_use]
    pub fn with_custom_evaluator(mut self, evaluator: Box<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Injects the navigation/notification collaborator.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Platform + 'static) -> Self {
        self.platform = Box::new(platform);
        self
    }

    /// Exposes trusted utility functions under `$$$`.
    #[must_use]
    pub fn with_utilities(mut self, utilities: Utilities) -> Self {
        self.utilities = utilities;
        self
    }

    /// Read-only data exposed under `$$$`.
    #[must_use]
    pub fn with_extra_context(mut self, extra: Map<String, Value>) -> Self {
        self.extra_context = extra;
        self
    }

    /// Initial global (`$$`) state.
    #[must_use]
    pub fn with_global_state(mut self, global: Map<String, Value>) -> Self {
        self.global_state = global;
        self
    }

    /// Execution mode for nodes that do not declare `eventExecutionMode`.
    #[must_use]
    pub fn with_default_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Validates the schema, seeds component state and returns the context.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DynUiError::DuplicateId`] when two nodes share an id.
    /// Nothing is built in that case.
    pub fn build(self, schema: Schema) -> Result<UiContext> {
        let _span = tracing::info_span!(
            "context_build",
            evaluator = self.evaluator.name(),
            nodes = schema.node_count()
        )
        .entered();

        let mut store = StateStore::new(self.global_state);
        store.initialize(&schema.components)?;

        let context = UiContext {
            store: RefCell::new(store),
            bus: EventBus::new(),
            evaluator: self.evaluator,
            platform: self.platform,
            utilities: self.utilities,
            extra_context: Value::Object(self.extra_context),
            registry: RefCell::new(NodeRegistry::new(schema)),
            default_mode: self.default_mode,
            page_token: CancellationToken::new(),
            node_tokens: RefCell::new(HashMap::new()),
            visibility: RefCell::new(HashMap::new()),
        };
        context.install_default_subscribers();
        tracing::info!("context ready");
        Ok(context)
    }
}

impl UiContext {
    /// Starts configuring a context.
    #[must_use]
    pub fn builder() -> UiContextBuilder {
        UiContextBuilder::default()
    }

    fn install_default_subscribers(&self) {
        self.bus.on("log", |payload| {
            tracing::info!(payload = %payload, "log event");
            Ok(())
        });
        self.bus.on("error", |payload| {
            tracing::error!(payload = %payload, "error event");
            Ok(())
        });
    }

    /// Name of the active evaluator backend.
    #[must_use]
    pub fn evaluator_name(&self) -> &'static str {
        self.evaluator.name()
    }

    /// The event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribes to a bus event. Shorthand for `bus().on(..)`.
    pub fn on<F>(&self, event: impl Into<String>, subscriber: F) -> SubscriptionId
    where
        F: Fn(&Value) -> crate::bus::SubscriberResult + 'static,
    {
        self.bus.on(event, subscriber)
    }

    /// Publishes on the event bus.
    pub fn emit(&self, event: &str, data: &Value) {
        self.bus.emit(event, data);
    }

    /// Replaces a node's entire state.
    pub fn set_component_state(&self, id: &str, state: Value) {
        self.store.borrow_mut().set_component_state(id, state);
    }

    /// A node's state, or `{}` when it has none.
    #[must_use]
    pub fn get_component_state(&self, id: &str) -> Value {
        self.store.borrow().get_component_state(id)
    }

    /// Writes `value` at the dotted `path` of a node's state, or of global
    /// state when `id` is `None`.
    pub fn update_state(&self, path: &str, value: Value, id: Option<&str>) {
        self.store.borrow_mut().update_state(path, value, id);
    }

    /// Reads the value at the dotted `path`; `None` when any segment is missing.
    #[must_use]
    pub fn get_state_value(&self, path: &str, id: Option<&str>) -> Operand {
        self.store.borrow().get_state_value(path, id)
    }

    /// Copies out global and component state.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.store.borrow().snapshot()
    }

    /// Replaces global and component state with a snapshot's contents.
    pub fn restore(&self, snapshot: StateSnapshot) {
        self.store.borrow_mut().restore(snapshot);
    }

    /// A copy of the node with this id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<Node> {
        self.registry.borrow().get(id).cloned()
    }

    /// Borrowed view of the node registry.
    pub fn registry(&self) -> Ref<'_, NodeRegistry> {
        self.registry.borrow()
    }

    /// Adds `node` (with its subtree) under `parent`, or as a new root, and
    /// seeds the new nodes' state from their defaults.
    ///
    /// # Errors
    ///
    /// - [`crate::DynUiError::DuplicateId`] if any new id is already taken.
    /// - [`crate::DynUiError::NodeNotFound`] if `parent` does not exist.
    pub fn add_node(&self, node: Node, parent: Option<&str>) -> Result<()> {
        let subtree = std::slice::from_ref(&node);
        let mut seeded = StateStore::default();
        seeded.initialize(subtree)?;
        self.registry.borrow_mut().add(node.clone(), parent)?;

        let ids = node.subtree_ids();
        self.reset_tokens(ids.iter().map(String::as_str));
        let mut store = self.store.borrow_mut();
        node.walk(&mut |n| {
            store.revive(&n.id);
            if let Some(state) = seeded.component_state(&n.id) {
                store.set_component_state(&n.id, state.clone());
            }
        });
        Ok(())
    }

    /// Tears down the node with `id` and detaches it with its subtree.
    ///
    /// Pending handlers of every removed node are cancelled and their state
    /// ids retired, so no late timer can write into them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DynUiError::NodeNotFound`] if no node has this id.
    pub fn remove_node(&self, id: &str) -> Result<Node> {
        self.teardown_node(id)?;
        let removed = self.registry.borrow_mut().remove(id)?;
        let mut visibility = self.visibility.borrow_mut();
        removed.walk(&mut |n| {
            visibility.remove(&n.id);
        });
        Ok(removed)
    }

    /// Shallow-merges `props` into a node's static props.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DynUiError::NodeNotFound`] if no node has this id.
    pub fn update_node_props(&self, id: &str, props: Map<String, Value>) -> Result<()> {
        self.registry.borrow_mut().update_props(id, props)
    }

    /// The current node trees as a schema document.
    #[must_use]
    pub fn export_schema(&self) -> Schema {
        self.registry.borrow().export()
    }

    /// Runs `f` against a read-only scope over the current state, then applies
    /// whatever writes and emits trusted utilities requested while it ran.
    pub(super) fn with_scope<R>(&self, f: impl FnOnce(&Scope<'_>) -> R) -> R {
        let (result, effects) = {
            let store = self.store.borrow();
            let functions = ContextFunctions::new(&store, &self.utilities);
            let scope = store.scope(&self.extra_context, &functions);
            let result = f(&scope);
            (result, functions.into_effects())
        };
        self.apply_effects(effects);
        result
    }

    fn apply_effects(&self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        tracing::debug!(count = effects.len(), "applying deferred effects");
        for effect in effects {
            match effect {
                Effect::UpdateState { path, value, id } => self.update_state(&path, value, id.as_deref()),
                Effect::SetComponentState { id, state } => self.set_component_state(&id, state),
                Effect::Emit { event, data } => self.emit(&event, &data),
            }
        }
    }
}

impl fmt::Debug for UiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiContext")
            .field("evaluator", &self.evaluator.name())
            .field("store", &self.store)
            .field("bus", &self.bus)
            .field("utilities", &self.utilities)
            .field("default_mode", &self.default_mode)
            .finish_non_exhaustive()
    }
}

/// A write or emit requested from inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Effect {
    UpdateState {
        path: String,
        value: Value,
        id: Option<String>,
    },
    SetComponentState {
        id: String,
        state: Value,
    },
    Emit {
        event: String,
        data: Value,
    },
}

/// Host functions reachable as `$$$.context.utils.*` and
/// `$$$.context.eventBus.emit`, falling back to registered utilities.
///
/// Reads see the store as it was when evaluation started.
struct ContextFunctions<'a> {
    store: &'a StateStore,
    utilities: &'a Utilities,
    effects: RefCell<Vec<Effect>>,
}

impl<'a> ContextFunctions<'a> {
    fn new(store: &'a StateStore, utilities: &'a Utilities) -> Self {
        Self {
            store,
            utilities,
            effects: RefCell::new(Vec::new()),
        }
    }

    fn into_effects(self) -> Vec<Effect> {
        self.effects.into_inner()
    }

    fn defer(&self, effect: Effect) -> std::result::Result<Operand, String> {
        self.effects.borrow_mut().push(effect);
        Ok(None)
    }

    fn context_util(&self, name: &str, args: &[Operand]) -> Option<std::result::Result<Operand, String>> {
        let result = match name {
            "updateState" => string_arg(args, 0, "path").and_then(|path| {
                self.defer(Effect::UpdateState {
                    path,
                    value: json_arg(args, 1),
                    id: optional_string_arg(args, 2),
                })
            }),
            "setComponentState" => string_arg(args, 0, "id").and_then(|id| {
                self.defer(Effect::SetComponentState {
                    id,
                    state: json_arg(args, 1),
                })
            }),
            "getStateValue" => string_arg(args, 0, "path")
                .map(|path| self.store.get_state_value(&path, optional_string_arg(args, 1).as_deref())),
            "getComponentState" => {
                string_arg(args, 0, "id").map(|id| Some(self.store.get_component_state(&id)))
            }
            "emit" => self.emit(args),
            _ => return None,
        };
        Some(result)
    }

    fn emit(&self, args: &[Operand]) -> std::result::Result<Operand, String> {
        let event = string_arg(args, 0, "event")?;
        self.defer(Effect::Emit {
            event,
            data: json_arg(args, 1),
        })
    }
}

impl HostFunctions for ContextFunctions<'_> {
    fn call(&self, path: &[&str], args: &[Operand]) -> Option<std::result::Result<Operand, String>> {
        match path {
            ["context", "utils", name] => self
                .context_util(name, args)
                .or_else(|| self.utilities.call(path, args)),
            ["context", "eventBus", "emit"] => Some(self.emit(args)),
            _ => self.utilities.call(path, args),
        }
    }
}

fn json_arg(args: &[Operand], index: usize) -> Value {
    value::into_json(args.get(index).cloned().flatten())
}

fn optional_string_arg(args: &[Operand], index: usize) -> Option<String> {
    match args.get(index)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        other => Some(value::to_js_string(other)),
    }
}

fn string_arg(args: &[Operand], index: usize, name: &str) -> std::result::Result<String, String> {
    optional_string_arg(args, index).ok_or_else(|| format!("missing `{name}` argument"))
}
