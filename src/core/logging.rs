//! `tracing` subscriber setup.
//!
//! Logs go to stderr so stdout carries only the JSON result envelope.
//! `RUST_LOG` takes precedence over the configured level.

use std::fmt;
use std::str::FromStr;
use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{fmt as layer_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::validation_invalid_argument(
                "logFormat",
                format!("Unknown log format '{}'. Supported formats: pretty, json", other),
                Some(vec!["pretty".to_string(), "json".to_string()]),
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Module target (e.g. `deploystep::tool`) in every line.
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            include_target: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(verbose: bool, format: LogFormat) -> Self {
        Self {
            level: if verbose { Level::DEBUG } else { Level::INFO },
            format,
            include_target: verbose,
        }
    }

    /// Filter directives used when `RUST_LOG` is not set.
    pub fn default_directives(&self) -> String {
        format!("{}", self.level).to_lowercase()
    }
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

        let registry = tracing_subscriber::registry().with(filter);
        let result = match config.format {
            LogFormat::Json => registry
                .with(
                    layer_fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_target(config.include_target),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    layer_fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target),
                )
                .try_init(),
        };
        if let Err(e) = result {
            eprintln!("Logging already initialized: {}", e);
        }
    });
}
