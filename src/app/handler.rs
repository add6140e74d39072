//! The action table: what a single handler does when it runs.
//!
//! This module implements [`UiContext::handle_event`], which executes one
//! [`Handler`] on behalf of the node that emitted the event. Scheduling
//! (delays, execution modes, cancellation) lives in [`super::scheduler`];
//! by the time a handler reaches this table its timers have already fired.
//!
//! # Actions
//!
//! | action | payload | effect |
//! |---|---|---|
//! | `updateState`, `update:modelValue` | `{path, value}` | state write at `target` or the emitting node |
//! | `emit` | `{event, data}` | event bus publish |
//! | `navigate` | `{url}` | navigation collaborator |
//! | `navigateBack` | `{delta?}` | navigation collaborator, `delta` defaults to 1 |
//! | `showToast` | `{title, icon?, duration?}` | notification collaborator |
//! | `custom` | value condition | resolved for its side effects |
//!
//! Unknown actions and malformed payloads are logged and skipped.
//!
//! # Example
//!
//! ```rust
//! use dynui::app::{Action, UiContext};
//! use dynui::domain::Handler;
//! use dynui::schema::Schema;
//! use serde_json::json;
//!
//! let context = UiContext::builder()
//!     .build(Schema::from_json_str(r#"[{ "id": "email", "componentName": "Input" }]"#)?)?;
//!
//! let handler = Handler::new(Action::UpdateModelValue, json!({ "path": "value", "value": "a@b.c" }));
//! context.handle_event(&handler, "email")?;
//! assert_eq!(context.get_state_value("value", Some("email")), Some(json!("a@b.c")));
//! # Ok::<(), dynui::DynUiError>(())
//! ```

use super::actions::Action;
use super::context::UiContext;
use crate::domain::{Handler, Result, ValueCondition};
use crate::infrastructure::ToastOptions;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct UpdatePayload {
    path: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct EmitPayload {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct NavigatePayload {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct NavigateBackPayload {
    #[serde(default)]
    delta: Option<u32>,
}

fn payload<T: DeserializeOwned>(handler: &Handler) -> Option<T> {
    match serde_json::from_value(handler.payload.clone()) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            tracing::warn!(action = %handler.action, error = %error, "malformed handler payload, skipping");
            None
        }
    }
}

impl UiContext {
    /// Runs one handler for the node `component_id`.
    ///
    /// # Errors
    ///
    /// Only `custom` handlers can fail: a resolution failure is returned as
    /// [`crate::DynUiError::Resolve`]. Every other problem is logged.
    pub fn handle_event(&self, handler: &Handler, component_id: &str) -> Result<()> {
        let _span = tracing::debug_span!(
            "handle_event",
            action = %handler.action,
            node_id = %component_id
        )
        .entered();

        match &handler.action {
            Action::UpdateState | Action::UpdateModelValue => {
                if let Some(update) = payload::<UpdatePayload>(handler) {
                    let target = handler.target.as_deref().unwrap_or(component_id);
                    tracing::debug!(path = %update.path, target = %target, "updating state");
                    self.update_state(&update.path, update.value, Some(target));
                }
            }
            Action::Emit => {
                if let Some(emit) = payload::<EmitPayload>(handler) {
                    self.emit(&emit.event, &emit.data);
                }
            }
            Action::Navigate => {
                if let Some(navigate) = payload::<NavigatePayload>(handler) {
                    self.platform.navigate(&navigate.url);
                }
            }
            Action::NavigateBack => {
                let back = if handler.payload.is_null() {
                    Some(NavigateBackPayload::default())
                } else {
                    payload::<NavigateBackPayload>(handler)
                };
                if let Some(back) = back {
                    self.platform.navigate_back(back.delta.filter(|d| *d > 0).unwrap_or(1));
                }
            }
            Action::ShowToast => {
                if let Some(toast) = payload::<ToastOptions>(handler) {
                    self.platform.show_toast(&toast);
                }
            }
            Action::Custom => match payload::<ValueCondition>(handler) {
                Some(condition @ ValueCondition::Mode(_)) => {
                    self.resolve(&condition)?;
                }
                Some(ValueCondition::Literal(_)) => {
                    tracing::debug!("custom payload is not a mode condition, nothing to run");
                }
                None => {}
            },
            Action::Unknown(name) => {
                tracing::warn!(action = %name, node_id = %component_id, "unknown action, skipping");
            }
        }
        Ok(())
    }
}
