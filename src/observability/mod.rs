//! Structured logging setup.
//!
//! Every layer logs through `tracing` macros with structured fields and wraps
//! its larger operations in spans (`context_build`, `dispatch`, `emit`,
//! `render_pass`, `evaluate`). This module only decides where those events
//! go: a `tracing-subscriber` fmt layer on stderr behind an `EnvFilter`.
//!
//! # Configuration
//!
//! Trace level is controlled via:
//! 1. `RUST_LOG` environment variable (highest priority)
//! 2. `trace_level` in the TOML configuration
//! 3. Default: `"info"`
//!
//! The library never installs a subscriber by itself; the binary (or a test,
//! or the embedding host) calls [`init_tracing`].

mod init;

pub use init::{init_tracing, DEFAULT_TRACE_LEVEL};
