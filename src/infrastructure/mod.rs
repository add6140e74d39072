//! Infrastructure layer: capabilities the host environment injects.
//!
//! Navigation and notifications are the only outward effects the engine
//! produces. They go through the [`Platform`] trait so the same schema runs
//! unchanged in a test harness, a command-line tool or a real UI shell.

pub mod platform;

pub use platform::{Platform, PlatformCall, RecordingPlatform, ToastOptions, TracingPlatform};
