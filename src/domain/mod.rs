//! Domain layer for the dynui engine.
//!
//! This module contains the schema data model and error types, independent of
//! evaluation, scheduling or any rendering concern.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases
//! - [`node`]: Schema nodes, value conditions and event handlers
//!
//! # Examples
//!
//! ```
//! use dynui::domain::{Node, Result};
//!
//! fn parse_node() -> Result<Node> {
//!     Ok(serde_json::from_str(r#"{"id": "title", "componentName": "BaseText"}"#)?)
//! }
//!
//! assert_eq!(parse_node().unwrap().id, "title");
//! ```

pub mod error;
pub mod node;

pub use error::{DynUiError, Result};
pub use node::{
    ExecutionMode, Handler, HandlerBinding, ModeCondition, Node, ValueCondition, ValueMode,
};
