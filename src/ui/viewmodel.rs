//! Render view model handed to the rendering collaborator.
//!
//! A render pass turns the node registry into a tree of [`RenderNode`]s:
//! component name, static props with resolved bindings merged on top, and the
//! visibility flag. Hidden nodes appear with `visible: false` and no
//! children, so the collaborator can keep a placeholder without walking into
//! content it will not draw.
//!
//! Every pass recomputes visibility from current state and feeds it through
//! [`UiContext::observe_visibility`], which is where a node that just became
//! hidden gets its subtree reset.
//!
//! # Example
//!
//! ```rust
//! use dynui::app::UiContext;
//! use dynui::schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::from_json_str(r#"[{
//!     "id": "greeting", "componentName": "Text",
//!     "props": { "size": "large" },
//!     "bindings": { "text": { "mode": "parse", "condition": "'Hello ' + $$.user" } }
//! }]"#)?;
//! let mut global = serde_json::Map::new();
//! global.insert("user".into(), json!("Ada"));
//! let context = UiContext::builder().with_global_state(global).build(schema)?;
//!
//! let tree = context.render_tree()?;
//! assert_eq!(tree[0].props["text"], json!("Hello Ada"));
//! assert_eq!(tree[0].props["size"], json!("large"));
//! # Ok::<(), dynui::DynUiError>(())
//! ```

use crate::app::UiContext;
use crate::domain::{Node, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// One node as the rendering collaborator sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    /// Node id.
    pub id: String,

    /// Component to instantiate.
    pub component_name: String,

    /// Static props overlaid with resolved bindings.
    pub props: Map<String, Value>,

    /// Whether the node is shown.
    pub visible: bool,

    /// Rendered children; empty for hidden nodes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderNode>,
}

impl UiContext {
    /// Runs a render pass over every root.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DynUiError::Resolve`] when a visible node's binding
    /// cannot be resolved. Visibility failures never error; see
    /// [`UiContext::is_visible`].
    pub fn render_tree(&self) -> Result<Vec<RenderNode>> {
        let roots = self.registry().roots().to_vec();
        let _span = tracing::debug_span!("render_pass", roots = roots.len()).entered();
        roots.iter().map(|root| self.render_node(root)).collect()
    }

    /// Renders one node and, if visible, its descendants.
    ///
    /// # Errors
    ///
    /// Same as [`UiContext::render_tree`].
    pub fn render_node(&self, node: &Node) -> Result<RenderNode> {
        let visible = self.observe_visibility(node);
        let mut props = node.props.clone();
        let mut children = Vec::new();

        if visible {
            for (name, binding) in &node.bindings {
                match self.resolve(binding)? {
                    Some(value) => {
                        props.insert(name.clone(), value);
                    }
                    None => {
                        props.remove(name);
                    }
                }
            }
            children = node
                .children
                .iter()
                .map(|child| self.render_node(child))
                .collect::<Result<_>>()?;
        }

        Ok(RenderNode {
            id: node.id.clone(),
            component_name: node.component_name.clone(),
            props,
            visible,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::app::UiContext;
    use crate::schema::Schema;
    use crate::DynUiError;
    use serde_json::json;

    #[test]
    fn hidden_nodes_have_no_children() {
        let schema = Schema::from_json_str(
            r#"[{
                "id": "section", "componentName": "View",
                "visibleOption": { "mode": "read", "condition": false },
                "children": [{ "id": "inner", "componentName": "Text" }]
            }]"#,
        )
        .unwrap();
        let context = UiContext::builder().build(schema).unwrap();
        let tree = context.render_tree().unwrap();
        assert!(!tree[0].visible);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn broken_binding_is_an_error() {
        let schema = Schema::from_json_str(
            r#"[{
                "id": "label", "componentName": "Text",
                "bindings": { "text": { "mode": "parse", "condition": "$.missing.name" } }
            }]"#,
        )
        .unwrap();
        let context = UiContext::builder().build(schema).unwrap();
        let err = context.render_tree().unwrap_err();
        assert!(matches!(err, DynUiError::Resolve { ref condition, .. } if condition == "$.missing.name"));
    }

    #[test]
    fn serializes_camel_case() {
        let schema = Schema::from_json_str(r#"[{ "id": "a", "componentName": "Text" }]"#).unwrap();
        let context = UiContext::builder().build(schema).unwrap();
        let tree = context.render_tree().unwrap();
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!([{ "id": "a", "componentName": "Text", "props": {}, "visible": true }])
        );
    }
}
