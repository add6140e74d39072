//! Application layer: the runtime context and everything that acts on it.
//!
//! This module sits between the schema/state/expression layers and whatever
//! host drives the UI (a renderer, the command-line tool, a test). It owns the
//! flow from user interaction to state change:
//!
//! ```text
//! UI event → dispatch → scheduler (delay / waitAfter) → action table
//!                                                          │
//!              ┌──────────────────┬───────────────────┬────┴────────────┐
//!              ▼                  ▼                   ▼                 ▼
//!         state store         event bus       resolver (custom)     platform
//!              │
//!              ▼
//! render pass → visibility engine → resolver → evaluator
//! ```
//!
//! # Modules
//!
//! - [`actions`]: the fixed action table's vocabulary
//! - [`context`]: [`UiContext`] and its builder
//! - [`handler`]: executing one handler
//! - [`resolver`]: value condition resolution
//! - [`scheduler`]: named dispatch, execution modes, cancellation
//! - [`visibility`]: visibility and cascading reset
//!
//! # Example
//!
//! ```rust
//! use dynui::app::UiContext;
//! use dynui::schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::from_json_str(r#"[{
//!     "id": "submit", "componentName": "Button",
//!     "events": { "click": { "action": "updateState", "payload": { "path": "clicked", "value": true } } }
//! }]"#)?;
//! let context = UiContext::builder().build(schema)?;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
//! runtime.block_on(context.dispatch("submit", "click"))?;
//! assert_eq!(context.get_state_value("clicked", Some("submit")), Some(json!(true)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod actions;
pub mod context;
pub mod handler;
pub mod resolver;
pub mod scheduler;
pub mod visibility;

pub use actions::Action;
pub use context::{UiContext, UiContextBuilder};
pub use resolver::resolve;
