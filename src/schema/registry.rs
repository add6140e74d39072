//! Node lookup and structural edits on the loaded schema.
//!
//! [`NodeRegistry`] owns the node trees after initialization. It enforces the
//! flat id namespace on every structural edit, not just at load time: adding a
//! subtree that reuses an existing id is rejected before anything changes.

use super::envelope::{Schema, SchemaMetadata};
use crate::domain::{DynUiError, Node, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// The live node trees plus the envelope fields they were loaded with.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRegistry {
    version: String,
    metadata: Option<SchemaMetadata>,
    roots: Vec<Node>,
}

impl NodeRegistry {
    /// Takes ownership of a schema's trees. Ids are assumed validated.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            version: schema.version,
            metadata: schema.metadata,
            roots: schema.components,
        }
    }

    /// Root nodes, in render order.
    #[must_use]
    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// Finds a node anywhere in the trees.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.roots.iter().find_map(|root| root.find(id))
    }

    /// Whether any node has this id.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.roots.iter_mut().find_map(|root| root.find_mut(id))
    }

    fn ids(&self) -> HashSet<&str> {
        let mut ids = HashSet::new();
        for root in &self.roots {
            root.walk(&mut |node| {
                ids.insert(node.id.as_str());
            });
        }
        ids
    }

    /// Inserts `node` as the last child of `parent`, or as a new root.
    ///
    /// # Errors
    ///
    /// - [`DynUiError::DuplicateId`] if any id in `node`'s subtree already
    ///   exists or repeats within the subtree.
    /// - [`DynUiError::NodeNotFound`] if `parent` does not exist.
    pub fn add(&mut self, node: Node, parent: Option<&str>) -> Result<()> {
        {
            let mut existing = self.ids();
            let mut duplicate = None;
            node.walk(&mut |n| {
                if duplicate.is_none() && !existing.insert(n.id.as_str()) {
                    duplicate = Some(n.id.clone());
                }
            });
            if let Some(id) = duplicate {
                return Err(DynUiError::DuplicateId(id));
            }
        }

        match parent {
            Some(parent_id) => {
                let parent = self
                    .get_mut(parent_id)
                    .ok_or_else(|| DynUiError::NodeNotFound(parent_id.to_string()))?;
                tracing::debug!(id = %node.id, parent = %parent_id, "node added");
                parent.children.push(node);
            }
            None => {
                tracing::debug!(id = %node.id, "root node added");
                self.roots.push(node);
            }
        }
        Ok(())
    }

    /// Detaches the node with `id` together with its subtree and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::NodeNotFound`] if no node has this id.
    pub fn remove(&mut self, id: &str) -> Result<Node> {
        if let Some(index) = self.roots.iter().position(|root| root.id == id) {
            return Ok(self.roots.remove(index));
        }
        fn detach(nodes: &mut Vec<Node>, id: &str) -> Option<Node> {
            if let Some(index) = nodes.iter().position(|n| n.id == id) {
                return Some(nodes.remove(index));
            }
            nodes.iter_mut().find_map(|n| detach(&mut n.children, id))
        }
        detach(&mut self.roots, id).ok_or_else(|| DynUiError::NodeNotFound(id.to_string()))
    }

    /// Shallow-merges `props` into the node's static props.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::NodeNotFound`] if no node has this id.
    pub fn update_props(&mut self, id: &str, props: Map<String, Value>) -> Result<()> {
        let node = self
            .get_mut(id)
            .ok_or_else(|| DynUiError::NodeNotFound(id.to_string()))?;
        tracing::debug!(id = %id, keys = props.len(), "node props updated");
        node.props.extend(props);
        Ok(())
    }

    /// Rebuilds a schema document from the current trees.
    #[must_use]
    pub fn export(&self) -> Schema {
        Schema {
            version: self.version.clone(),
            components: self.roots.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> NodeRegistry {
        let mut page = Node::new("page", "Page");
        page.children.push(Node::new("title", "Text"));
        NodeRegistry::new(Schema::new(vec![page]))
    }

    #[test]
    fn add_rejects_existing_ids() {
        let mut registry = registry();
        let err = registry.add(Node::new("title", "Text"), Some("page")).unwrap_err();
        assert!(matches!(err, DynUiError::DuplicateId(ref id) if id == "title"));

        let mut card = Node::new("card", "Card");
        card.children.push(Node::new("card", "Text"));
        assert!(matches!(registry.add(card, None), Err(DynUiError::DuplicateId(_))));
        assert_eq!(registry.roots().len(), 1);
    }

    #[test]
    fn add_remove_and_update() {
        let mut registry = registry();
        registry.add(Node::new("footer", "Text"), Some("page")).unwrap();
        assert!(registry.contains("footer"));
        assert!(matches!(
            registry.add(Node::new("x", "Text"), Some("nowhere")),
            Err(DynUiError::NodeNotFound(_))
        ));

        let mut props = Map::new();
        props.insert("text".into(), json!("Hello"));
        registry.update_props("title", props).unwrap();
        assert_eq!(registry.get("title").unwrap().props["text"], json!("Hello"));

        let removed = registry.remove("footer").unwrap();
        assert_eq!(removed.id, "footer");
        assert!(!registry.contains("footer"));
        assert_eq!(registry.export().components[0].children.len(), 1);
    }
}
