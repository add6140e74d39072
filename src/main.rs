//! Command-line wrapper and entry point.
//!
//! This module provides the thin integration layer between the dynui library
//! and a terminal. It loads a schema (and optionally a TOML configuration and
//! a state snapshot), fires the requested UI events, and prints what a
//! renderer would receive.
//!
//! # Lifecycle
//!
//! 1. **Load**: Parse config, initialize tracing, load the schema
//! 2. **Initialize**: Build the context; configuration errors exit with code 2
//! 3. **Restore**: Load `--state` if the file exists
//! 4. **Dispatch**: Spawn every `--dispatch node:event` on a local task set
//!    and wait for all of them, timers included
//! 5. **Report**: Print the render tree, platform requests and final state as
//!    pretty JSON on stdout; save `--state`
//!
//! # Example
//!
//! ```text
//! dynui form.json --config host.toml --dispatch submit:click --state form-state.json
//! ```

use clap::Parser;
use dynui::infrastructure::RecordingPlatform;
use dynui::observability::init_tracing;
use dynui::state::StateSnapshot;
use dynui::{Config, DynUiError, Result, Schema};
use futures_util::future::join_all;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "dynui")]
#[command(about = "Evaluate a schema-described UI and fire events against it")]
struct Cli {
    /// Path to the schema JSON (envelope, node array or single node)
    schema: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Event to fire, as `node_id:event` (repeatable)
    #[arg(long = "dispatch", value_name = "NODE:EVENT")]
    dispatches: Vec<String>,

    /// State snapshot file (load on start if present, save on exit)
    #[arg(long)]
    state: Option<PathBuf>,
}

fn parse_dispatch(arg: &str) -> Result<(String, String)> {
    match arg.rsplit_once(':') {
        Some((node, event)) if !node.is_empty() && !event.is_empty() => Ok((node.to_string(), event.to_string())),
        _ => Err(DynUiError::Config(format!(
            "invalid --dispatch `{arg}`, expected `node_id:event`"
        ))),
    }
}

fn is_configuration_error(error: &DynUiError) -> bool {
    matches!(
        error,
        DynUiError::DuplicateId(_) | DynUiError::Config(_) | DynUiError::Schema(_) | DynUiError::Toml(_)
    )
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    init_tracing(&config);

    let dispatches = cli
        .dispatches
        .iter()
        .map(|arg| parse_dispatch(arg))
        .collect::<Result<Vec<_>>>()?;

    let schema = Schema::from_file(&cli.schema)?;
    let platform = RecordingPlatform::new();
    let context = Rc::new(
        config
            .context_builder()
            .with_platform(platform.clone())
            .build(schema)?,
    );

    if let Some(path) = cli.state.as_ref().filter(|p| p.exists()) {
        context.restore(StateSnapshot::load(path)?);
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
    let local = tokio::task::LocalSet::new();
    let outcomes = local.block_on(&runtime, async {
        let handles = dispatches
            .into_iter()
            .map(|(node_id, event)| context.spawn_dispatch(node_id, event))
            .collect::<Vec<_>>();
        join_all(handles).await
    });
    for outcome in outcomes {
        match outcome {
            Ok(result) => {
                result?;
            }
            Err(join_error) => tracing::error!(error = %join_error, "dispatch task failed"),
        }
    }

    let report = json!({
        "tree": context.render_tree()?,
        "platformCalls": platform.calls(),
        "state": context.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = &cli.state {
        context.snapshot().save(path)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if is_configuration_error(&error) => {
            eprintln!("configuration error: {error}");
            ExitCode::from(2)
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
