//! The fixed action table shared by every event handler.
//!
//! This module defines the [`Action`] type, the closed set of effects a schema
//! handler can request. Handlers name their action by string in the schema; the
//! string is mapped onto this enum once, at deserialization time, so dispatch is
//! a plain `match` instead of a string lookup.
//!
//! # Architecture
//!
//! The dispatcher matches on the action and either mutates the state store,
//! publishes on the event bus, re-enters the resolver, or hands the payload to
//! the navigation/notification collaborator. Names the table does not know are
//! preserved as [`Action::Unknown`] so they can be logged and skipped instead of
//! failing the whole schema.
//!
//! # Example
//!
//! ```rust
//! use dynui::app::Action;
//!
//! let action: Action = "update:modelValue".into();
//! assert_eq!(action, Action::UpdateModelValue);
//! assert_eq!(action.as_str(), "update:modelValue");
//!
//! let unknown = Action::from("teleport");
//! assert!(matches!(unknown, Action::Unknown(ref name) if name == "teleport"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Effects a handler may request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// Writes `payload.value` at `payload.path` into the target node's state.
    UpdateState,

    /// Same effect as [`Action::UpdateState`]; emitted by form components.
    UpdateModelValue,

    /// Publishes `payload.event` with `payload.data` on the event bus.
    Emit,

    /// Asks the navigation collaborator to open `payload.url`.
    Navigate,

    /// Asks the navigation collaborator to go back `payload.delta` pages.
    NavigateBack,

    /// Asks the notification collaborator to show a toast.
    ShowToast,

    /// Resolves `payload` as a value condition for its side effects.
    Custom,

    /// Any name outside the table. Logged and skipped at dispatch.
    Unknown(String),
}

impl Action {
    /// Returns the schema spelling of this action.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::UpdateState => "updateState",
            Self::UpdateModelValue => "update:modelValue",
            Self::Emit => "emit",
            Self::Navigate => "navigate",
            Self::NavigateBack => "navigateBack",
            Self::ShowToast => "showToast",
            Self::Custom => "custom",
            Self::Unknown(name) => name,
        }
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        match name {
            "updateState" => Self::UpdateState,
            "update:modelValue" => Self::UpdateModelValue,
            "emit" => Self::Emit,
            "navigate" => Self::Navigate,
            "navigateBack" => Self::NavigateBack,
            "showToast" => Self::ShowToast,
            "custom" => Self::Custom,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        match Self::from(name.as_str()) {
            Self::Unknown(_) => Self::Unknown(name),
            known => known,
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
