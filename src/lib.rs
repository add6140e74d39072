//! dynui: the expression, state, visibility and event engine behind
//! schema-described user interfaces.
//!
//! A schema is a tree of nodes whose visibility, bound props, default state
//! and event behavior come from a small embedded expression language rather
//! than hard-coded logic. This crate evaluates those expressions, owns the
//! state they read, decides what is visible, and runs event handlers on a
//! timer-driven, single-threaded scheduler. Painting, navigation and toasts
//! belong to collaborators the host injects.
//!
//! # Architecture
//!
//! The crate follows a layered architecture pattern:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  CLI shim (main.rs)                                 │  ← Entry point
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │  ← UiContext
//! │  - Resolver, visibility engine                      │
//! │  - Action table, scheduler, teardown                │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Expression    │   │ State (state/)│   │ Event Bus     │
//! │ (expression/) │   │ - Store       │   │ (bus/)        │
//! │ - Two backends│   │ - Snapshots   │   │ - Pub/sub     │
//! │ - Scope model │   │               │   │               │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!         │                    │                    │
//! ┌─────────────────────────────────────────────────────┐
//! │  Schema, Domain, Infrastructure & UI Layers         │
//! │  - Schema envelope + node registry (schema/)        │
//! │  - Node model, error types (domain/)                │
//! │  - Navigation/toast collaborator (infrastructure/)  │
//! │  - Render view model (ui/)                          │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Observability (observability/)                     │  ← tracing setup
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: [`UiContext`], resolution, visibility, dispatch
//! - [`bus`]: Event bus with per-subscriber failure isolation
//! - [`domain`]: Schema node model and error types
//! - [`expression`]: Evaluator strategy trait, backends and scope model
//! - [`infrastructure`]: Navigation and notification collaborator
//! - [`schema`]: Schema documents and the node registry
//! - [`state`]: State store and snapshots
//! - [`ui`]: Render view model
//! - [`observability`]: Tracing subscriber setup
//!
//! # Configuration
//!
//! Hosts describe their capabilities and initial data in TOML:
//!
//! ```toml
//! evaluator = "restricted"          # the host cannot compile code at runtime
//! trace_level = "debug"
//! default_execution_mode = "sequential"
//!
//! [global_state]
//! user = { name = "anon" }
//!
//! [extra_context]
//! locale = "en"
//! ```
//!
//! # Example
//!
//! ```rust
//! use dynui::{initialize, Config};
//! use dynui::schema::Schema;
//!
//! let config = Config::from_toml_str(r#"
//!     evaluator = "restricted"
//!     [global_state]
//!     signed_in = true
//! "#)?;
//! let schema = Schema::from_json_str(r#"[{
//!     "id": "logout", "componentName": "Button",
//!     "visibleOption": { "mode": "parse", "condition": "$$.signed_in === true" }
//! }]"#)?;
//!
//! let context = initialize(&config, schema)?;
//! assert!(context.render_tree()?[0].visible);
//! # Ok::<(), dynui::DynUiError>(())
//! ```

#![allow(clippy::multiple_crate_versions)]

pub mod app;
pub mod bus;
pub mod domain;
pub mod expression;
pub mod infrastructure;
pub mod schema;
pub mod state;

pub mod ui;

pub mod observability;

pub use app::{Action, UiContext, UiContextBuilder};
pub use domain::{DynUiError, Result};
pub use expression::{Evaluator, EvaluatorKind};
pub use schema::Schema;
pub use ui::RenderNode;

use domain::ExecutionMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Host configuration, usually loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Evaluator backend the host can run.
    ///
    /// `unrestricted` when the host allows compiling expressions at runtime,
    /// `restricted` for sandboxed hosts. Default: `unrestricted`
    pub evaluator: EvaluatorKind,

    /// Tracing filter directive.
    ///
    /// Options: `trace`, `debug`, `info`, `warn`, `error`, or any `EnvFilter`
    /// directive. Default: `"info"`
    pub trace_level: Option<String>,

    /// Execution mode for nodes without `eventExecutionMode`. Default: `parallel`
    pub default_execution_mode: ExecutionMode,

    /// Initial global (`$$`) state.
    pub global_state: Map<String, Value>,

    /// Read-only data exposed under `$$$`.
    pub extra_context: Map<String, Value>,
}

impl Config {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::Toml`] for malformed TOML, unknown keys or
    /// unknown enum values.
    ///
    /// # Example
    ///
    /// ```rust
    /// use dynui::{Config, EvaluatorKind};
    ///
    /// let config = Config::from_toml_str("evaluator = \"restricted\"")?;
    /// assert_eq!(config.evaluator, EvaluatorKind::Restricted);
    /// assert!(config.global_state.is_empty());
    /// # Ok::<(), dynui::DynUiError>(())
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = ?path, "loading configuration");
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// A context builder preloaded with this configuration.
    ///
    /// Hosts add their platform and utilities before building.
    #[must_use]
    pub fn context_builder(&self) -> UiContextBuilder {
        UiContext::builder()
            .with_evaluator(self.evaluator)
            .with_default_execution_mode(self.default_execution_mode)
            .with_global_state(self.global_state.clone())
            .with_extra_context(self.extra_context.clone())
    }
}

/// Builds a ready [`UiContext`] for `schema` with the stock collaborators.
///
/// Tracing is not installed here; call [`observability::init_tracing`] first
/// if you want output.
///
/// # Errors
///
/// Returns [`DynUiError::DuplicateId`] when two nodes share an id. The
/// interface must not render in that case.
pub fn initialize(config: &Config, schema: Schema) -> Result<UiContext> {
    tracing::info!(evaluator = %config.evaluator, "initializing context");
    config.context_builder().build(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config = Config::from_toml_str(
            r#"
            evaluator = "restricted"
            trace_level = "debug"
            default_execution_mode = "sequential"
            [global_state]
            user = { name = "anon" }
            [extra_context]
            locale = "en"
            "#,
        )
        .unwrap();
        assert_eq!(config.evaluator, EvaluatorKind::Restricted);
        assert_eq!(config.default_execution_mode, ExecutionMode::Sequential);
        assert_eq!(config.global_state["user"]["name"], "anon");
        assert_eq!(config.extra_context["locale"], "en");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(Config::from_toml_str("evaluatr = \"restricted\""), Err(DynUiError::Toml(_))));
        assert!(matches!(Config::from_toml_str("evaluator = \"jit\""), Err(DynUiError::Toml(_))));
    }
}
