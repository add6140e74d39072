//! Synchronous publish/subscribe with per-subscriber failure isolation.
//!
//! [`EventBus::emit`] delivers to a snapshot of the subscriber list taken when
//! the call starts, so subscribers that register or unregister others while
//! being called do not change the in-flight delivery. A subscriber that
//! returns an error or panics is logged and skipped; delivery continues with
//! the next one and the emitter never sees the failure.
//!
//! # Example
//!
//! ```
//! use dynui::bus::EventBus;
//! use serde_json::json;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let bus = EventBus::new();
//! let seen = Rc::new(Cell::new(0));
//!
//! bus.on("saved", |_| Err("subscriber failed".into()));
//! let counter = Rc::clone(&seen);
//! bus.on("saved", move |_| {
//!     counter.set(counter.get() + 1);
//!     Ok(())
//! });
//!
//! bus.emit("saved", &json!({ "id": 1 }));
//! assert_eq!(seen.get(), 1);
//! ```

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// What a subscriber reports back. Errors are logged, never propagated.
pub type SubscriberResult = std::result::Result<(), Box<dyn std::error::Error>>;

type Subscriber = Rc<dyn Fn(&Value) -> SubscriberResult>;

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Event name to ordered subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: RefCell<HashMap<String, Vec<(SubscriptionId, Subscriber)>>>,
    next_id: Cell<u64>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `subscriber` to the list for `event`.
    pub fn on<F>(&self, event: impl Into<String>, subscriber: F) -> SubscriptionId
    where
        F: Fn(&Value) -> SubscriberResult + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let event = event.into();
        tracing::trace!(event = %event, subscription = id.0, "subscriber registered");
        self.subscribers
            .borrow_mut()
            .entry(event)
            .or_default()
            .push((id, Rc::new(subscriber)));
        id
    }

    /// Removes one subscription, or every subscriber of `event` when `id` is `None`.
    ///
    /// Returns whether anything was removed.
    pub fn off(&self, event: &str, id: Option<SubscriptionId>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        match id {
            Some(id) => {
                let Some(list) = subscribers.get_mut(event) else {
                    return false;
                };
                let before = list.len();
                list.retain(|(sub, _)| *sub != id);
                let removed = list.len() != before;
                if list.is_empty() {
                    subscribers.remove(event);
                }
                removed
            }
            None => subscribers.remove(event).is_some(),
        }
    }

    /// Number of subscribers currently registered for `event`.
    #[must_use]
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers.borrow().get(event).map_or(0, Vec::len)
    }

    /// Delivers `payload` to every subscriber of `event`, in registration order.
    pub fn emit(&self, event: &str, payload: &Value) {
        let snapshot: Vec<(SubscriptionId, Subscriber)> = match self.subscribers.borrow().get(event) {
            Some(list) => list.clone(),
            None => {
                tracing::trace!(event = %event, "emit with no subscribers");
                return;
            }
        };

        let _span = tracing::debug_span!("emit", event = %event, subscribers = snapshot.len()).entered();
        for (id, subscriber) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| subscriber(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::error!(event = %event, subscription = id.0, error = %error, "event subscriber failed");
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(event = %event, subscription = id.0, panic = %message, "event subscriber panicked");
                }
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.subscribers.borrow();
        let mut counts: Vec<(&String, usize)> = subscribers.iter().map(|(event, list)| (event, list.len())).collect();
        counts.sort();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}
