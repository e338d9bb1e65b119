//! Logging setup for `taskgraph` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `TASKGRAPH_LOG` environment variable (a level or full filter
//!    directives, e.g. "taskgraph::domain=debug")
//! 3. `--verbose`, which means `debug`
//! 4. `log_level` from the project config
//! 5. default to `warn`
//!
//! Logs go to stderr so they never mix with command output.

use std::io::IsTerminal;

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable holding a log filter
pub const LOG_ENV: &str = "TASKGRAPH_LOG";

/// Initialise the global logging subscriber.
///
/// Call once at startup; a second call returns an error.
pub fn init_logging(
    cli_level: Option<LogLevel>,
    verbose: bool,
    config_level: Option<&str>,
) -> Result<()> {
    let env_level = std::env::var(LOG_ENV).ok();
    let filter = resolve_filter(cli_level, env_level.as_deref(), verbose, config_level);

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}

fn resolve_filter(
    cli_level: Option<LogLevel>,
    env_level: Option<&str>,
    verbose: bool,
    config_level: Option<&str>,
) -> EnvFilter {
    if let Some(lvl) = cli_level {
        return EnvFilter::new(lvl.as_str());
    }

    if let Some(filter) = env_level.and_then(parse_filter) {
        return filter;
    }

    if verbose {
        return EnvFilter::new("debug");
    }

    config_level
        .and_then(parse_filter)
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn parse_filter(s: &str) -> Option<EnvFilter> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    EnvFilter::try_new(s).ok()
}
