//! Navigation and notification collaborator.
//!
//! The engine never navigates or draws anything itself: `navigate`,
//! `navigateBack` and `showToast` handlers hand their payloads to a
//! [`Platform`] injected into the context. Two implementations ship with the
//! crate:
//!
//! - [`TracingPlatform`]: logs each request. The default for headless use.
//! - [`RecordingPlatform`]: keeps every request in memory, for tests and for
//!   the command-line tool's report.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Default toast duration in milliseconds when the payload does not set one.
pub const DEFAULT_TOAST_DURATION_MS: u64 = 1500;

/// `showToast` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastOptions {
    /// Text to show.
    pub title: String,

    /// Icon name understood by the host, e.g. `success`, `error`, `none`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// How long the toast stays up, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl ToastOptions {
    /// Duration to use, falling back to [`DEFAULT_TOAST_DURATION_MS`].
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration.unwrap_or(DEFAULT_TOAST_DURATION_MS)
    }
}

/// Host capability for page navigation and transient notifications.
pub trait Platform {
    /// Opens the page at `url`.
    fn navigate(&self, url: &str);

    /// Goes back `delta` pages.
    fn navigate_back(&self, delta: u32);

    /// Shows a transient notification.
    fn show_toast(&self, toast: &ToastOptions);
}

/// Platform that only logs what it was asked to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPlatform;

impl Platform for TracingPlatform {
    fn navigate(&self, url: &str) {
        tracing::info!(url = %url, "navigate");
    }

    fn navigate_back(&self, delta: u32) {
        tracing::info!(delta, "navigate back");
    }

    fn show_toast(&self, toast: &ToastOptions) {
        tracing::info!(
            title = %toast.title,
            icon = toast.icon.as_deref().unwrap_or("none"),
            duration_ms = toast.duration_ms(),
            "show toast"
        );
    }
}

/// One request received by a [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PlatformCall {
    /// `navigate`.
    Navigate {
        /// Target page.
        url: String,
    },
    /// `navigateBack`.
    NavigateBack {
        /// Pages to go back.
        delta: u32,
    },
    /// `showToast`.
    ShowToast(ToastOptions),
}

/// Platform that records requests. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPlatform {
    calls: Rc<RefCell<Vec<PlatformCall>>>,
}

impl RecordingPlatform {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: PlatformCall) {
        tracing::debug!(call = ?call, "platform request recorded");
        self.calls.borrow_mut().push(call);
    }
}

impl Platform for RecordingPlatform {
    fn navigate(&self, url: &str) {
        self.record(PlatformCall::Navigate { url: url.to_string() });
    }

    fn navigate_back(&self, delta: u32) {
        self.record(PlatformCall::NavigateBack { delta });
    }

    fn show_toast(&self, toast: &ToastOptions) {
        self.record(PlatformCall::ShowToast(toast.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn toast_payload_deserializes_with_defaults() {
        let toast: ToastOptions = serde_json::from_value(json!({ "title": "Saved", "icon": "success" })).unwrap();
        assert_eq!(toast.icon.as_deref(), Some("success"));
        assert_eq!(toast.duration_ms(), DEFAULT_TOAST_DURATION_MS);
    }

    #[test]
    fn recorder_clones_share_log() {
        let recorder = RecordingPlatform::new();
        let handle = recorder.clone();
        recorder.navigate("/pages/form/index");
        recorder.navigate_back(2);
        assert_eq!(
            handle.calls(),
            vec![
                PlatformCall::Navigate {
                    url: "/pages/form/index".to_string()
                },
                PlatformCall::NavigateBack { delta: 2 },
            ]
        );
    }
}
