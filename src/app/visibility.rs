//! Visibility and cascading state reset.
//!
//! Visibility is derived, never stored as truth: [`UiContext::is_visible`]
//! resolves the node's `visibleOption` against current state on every call.
//! A node without a condition is visible. A condition that resolves to
//! undefined is falsy and hides the node. A broken condition never hides
//! anything; it logs a warning and the node stays visible.
//!
//! When a node goes from visible to hidden its state, and the state of every
//! descendant that declares a `defaultValue`, is reset to those defaults. The
//! descendants' own visibility plays no part in the cascade.
//!
//! The only thing remembered between passes is the last observed flag per
//! node, kept by [`UiContext::observe_visibility`] purely to detect the
//! visible-to-hidden edge.

use super::context::UiContext;
use crate::domain::{DynUiError, Node, Result};
use crate::expression::value;

impl UiContext {
    /// Whether `node` is currently visible. Fails open.
    #[must_use]
    pub fn is_visible(&self, node: &Node) -> bool {
        match self.try_is_visible(node) {
            Ok(visible) => visible,
            Err(error) => {
                tracing::warn!(node_id = %node.id, error = %error, "visibility condition failed, keeping node visible");
                true
            }
        }
    }

    /// Strict form of [`UiContext::is_visible`].
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::Visibility`] naming the node when its condition
    /// cannot be resolved.
    pub fn try_is_visible(&self, node: &Node) -> Result<bool> {
        let Some(condition) = &node.visible_option else {
            return Ok(true);
        };
        let resolved = self.resolve(condition).map_err(|source| DynUiError::Visibility {
            id: node.id.clone(),
            source: Box::new(source),
        })?;
        Ok(value::truthy(&resolved))
    }

    /// Applies a visibility transition reported by the rendering collaborator.
    ///
    /// Hiding resets the subtree; showing has no side effect.
    pub fn handle_visibility_change(&self, node: &Node, visible: bool) {
        if !visible {
            self.reset_subtree(node);
        }
    }

    /// Recomputes `node`'s visibility and, on a visible-to-hidden edge since
    /// the previous observation, resets its subtree.
    ///
    /// The first observation of a node only records the flag.
    pub fn observe_visibility(&self, node: &Node) -> bool {
        let visible = self.is_visible(node);
        let previous = self.visibility.borrow_mut().insert(node.id.clone(), visible);
        if previous == Some(true) && !visible {
            tracing::debug!(node_id = %node.id, "node hidden");
            self.handle_visibility_change(node, false);
        }
        visible
    }

    /// Resets `node` and every descendant that declares a `defaultValue`.
    pub fn reset_subtree(&self, node: &Node) {
        let _span = tracing::debug_span!("reset_subtree", node_id = %node.id).entered();
        let mut store = self.store.borrow_mut();
        let mut reset = 0usize;
        node.walk(&mut |n| {
            if let Some(default) = n.default_value.as_ref().filter(|v| !v.is_null()) {
                store.set_component_state(&n.id, default.clone());
                reset += 1;
            }
        });
        tracing::debug!(reset, "subtree reset to defaults");
    }

    /// Like [`UiContext::reset_subtree`], looked up by id.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::NodeNotFound`] if no node has this id.
    pub fn reset_node(&self, id: &str) -> Result<()> {
        let node = self.node(id).ok_or_else(|| DynUiError::NodeNotFound(id.to_string()))?;
        self.reset_subtree(&node);
        Ok(())
    }
}
