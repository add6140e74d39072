//! Tracing initialization and subscriber setup.

use crate::Config;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_TRACE_LEVEL: &str = "info";

/// Installs the global tracing subscriber.
///
/// Sets up a subscriber pipeline that:
/// 1. Filters events with an [`EnvFilter`]
/// 2. Formats them to stderr, keeping stdout free for program output
///
/// # Parameters
///
/// * `config` - Configuration carrying the optional `trace_level` filter
///
/// # Trace Level Resolution
///
/// 1. `RUST_LOG` when set and valid
/// 2. `config.trace_level` if set
/// 3. Default: `"info"`
///
/// # Initialization Behavior
///
/// Idempotent: only the first call installs anything, later calls (and calls
/// after another subscriber was installed) are ignored.
///
/// # Example
///
/// ```rust
/// use dynui::observability::init_tracing;
/// use dynui::Config;
///
/// let config = Config {
///     trace_level: Some("debug".to_string()),
///     ..Default::default()
/// };
///
/// init_tracing(&config);
///
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(config: &Config) {
    let level = config
        .trace_level
        .clone()
        .unwrap_or_else(|| DEFAULT_TRACE_LEVEL.to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false));

    if subscriber.try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
