//! Logging installation and build identity.
//!
//! # Design
//! - One entry point installs the subscriber in compact text or flattened JSON.
//! - The build SHA is recorded once so request spans all report the same value.

use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Configure and install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over [`LoggingConfig::level`] when set.
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be installed (for example,
/// because another subscriber has already been set globally).
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.to_owned());

    let registry = tracing_subscriber::registry().with(build_env_filter(config.level));
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall { source })?;
    debug!(build_sha = config.build_sha, format = ?config.format, "logging initialised");
    Ok(())
}

/// Build identifier recorded by [`init_logging`], or `dev` before it runs.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Fallback filter directive, e.g. `info` or `tagrelay_api=debug`.
    pub level: &'a str,
    /// Output format selection for the tracing subscriber.
    pub format: LogFormat,
    /// Build identifier attached to request spans.
    pub build_sha: &'a str,
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Emit logs as structured JSON objects.
    Json,
    /// Emit human-readable logs.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Resolve a configured format name, falling back to [`LogFormat::infer`].
    #[must_use]
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => Self::Json,
            Some("pretty" | "text") => Self::Pretty,
            _ => Self::infer(),
        }
    }
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
