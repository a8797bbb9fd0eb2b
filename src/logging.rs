// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `STATECRAFT_LOG` environment variable (a level like "debug", or a full
//!    `EnvFilter` directive such as "statecraft=debug,warn")
//! 3. `[logging] level` from the config file
//! 4. default to `info`
//!
//! Logs go to STDERR. Every line emitted while a resource is being evaluated
//! carries its `resource{name=...}` span.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "STATECRAFT_LOG";

/// Initialise the global logging subscriber.
///
/// Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>, config_level: Option<tracing::Level>) -> Result<()> {
    let filter = resolve_filter(
        cli_level,
        std::env::var(LOG_ENV_VAR).ok().as_deref(),
        config_level,
    );

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("could not install log subscriber: {e}"))?;

    Ok(())
}

fn resolve_filter(
    cli_level: Option<LogLevel>,
    env_value: Option<&str>,
    config_level: Option<tracing::Level>,
) -> EnvFilter {
    if let Some(lvl) = cli_level {
        return EnvFilter::new(level_directive(level_from_log_level(lvl)));
    }
    if let Some(filter) = env_value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
    {
        return filter;
    }
    let level = config_level.unwrap_or(tracing::Level::INFO);
    EnvFilter::new(level_directive(level))
}

fn level_directive(level: tracing::Level) -> String {
    level.as_str().to_lowercase()
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

pub(crate) fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_env_and_config() {
        let filter = resolve_filter(
            Some(LogLevel::Trace),
            Some("error"),
            Some(tracing::Level::WARN),
        );
        assert_eq!(filter.to_string(), EnvFilter::new("trace").to_string());
    }

    #[test]
    fn env_wins_over_config() {
        let filter = resolve_filter(None, Some("statecraft=debug"), Some(tracing::Level::WARN));
        assert_eq!(
            filter.to_string(),
            EnvFilter::new("statecraft=debug").to_string()
        );
    }

    #[test]
    fn config_then_default() {
        assert_eq!(
            resolve_filter(None, None, Some(tracing::Level::WARN)).to_string(),
            EnvFilter::new("warn").to_string()
        );
        assert_eq!(
            resolve_filter(None, Some("  "), None).to_string(),
            EnvFilter::new("info").to_string()
        );
    }

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level_str("Warning"), Some(tracing::Level::WARN));
        assert_eq!(parse_level_str("nope"), None);
    }
}
