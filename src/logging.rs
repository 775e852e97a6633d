//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Diagnostics go to stderr so stdout stays free for `inspect` JSON.
//!
//! - `warn`: columns that could not be decoded, unresolved strLs
//! - `info`: stage progress and output paths
//! - `debug`: per-column decoding details
//! - `trace`: section offsets inside the `.dta` file, with module targets shown

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::Error;
use crate::types::Result;

/// Logging behaviour selected on the command line
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    /// Print the module path of each event
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Map `-v` count and `-q` to a level.
    ///
    /// - `-q`: warn
    /// - none: info
    /// - `-v`: debug
    /// - `-vv` and more: trace
    pub fn from_verbosity(verbosity: u8, quiet: bool) -> Self {
        let level = if quiet {
            Level::WARN
        } else {
            match verbosity {
                0 => Level::INFO,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            }
        };
        Self {
            level,
            with_target: level == Level::TRACE,
            ..Default::default()
        }
    }

    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target)
        .without_time();

    tracing_subscriber::registry()
        .with(build_env_filter(config.level))
        .with(layer)
        .try_init()
        .map_err(|e| Error::InvalidInput(format!("logging already initialized: {}", e)))
}

/// `RUST_LOG` wins over the command-line level when set
fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level))
}

fn default_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::new(format!("warn,dta_decode={}", level))
}
