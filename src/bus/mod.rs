//! Event Bus: synchronous publish/subscribe between handlers, utilities and
//! the host program.

pub mod event_bus;

pub use event_bus::{EventBus, SubscriberResult, SubscriptionId};
