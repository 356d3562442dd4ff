//! Logger Module
//!
//! A logging system based on `tracing-subscriber` with support for:
//! - Console output with color control
//! - File output in Full, Compact or JSON format

pub mod config;
pub mod error;

#[cfg(test)]
mod tests;

pub use self::config::*;
pub use error::LoggerError;

use std::fs::{self, File, OpenOptions};
use std::io::IsTerminal;
use std::sync::Mutex;

use tracing_subscriber::{Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global logger with the given configuration.
///
/// Fails instead of panicking when a global subscriber is already installed.
pub fn init_logger(config: LoggerConfig) -> Result<(), LoggerError> {
    config
        .validate()
        .map_err(|e| LoggerError::config(e.to_string()))?;

    let filter = config
        .env_filter()
        .map_err(|e| LoggerError::config(e.to_string()))?;

    tracing_subscriber::registry()
        .with(build_layers(&config)?)
        .with(filter)
        .try_init()
        .map_err(|e| LoggerError::AlreadyInitialized {
            message: e.to_string(),
        })
}

/// Assemble the output layers for `config`.
///
/// The file layer goes first so console ANSI settings never leak into file
/// output (tokio-rs/tracing#1817).
pub(crate) fn build_layers(config: &LoggerConfig) -> Result<Vec<BoxedLayer>, LoggerError> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.file.enabled {
        let writer = Mutex::new(open_log_file(&config.file)?);
        let base = fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer);
        let layer: BoxedLayer = match config.file.format {
            LogFormat::Full => base.boxed(),
            LogFormat::Compact => base.compact().boxed(),
            LogFormat::Json => base.json().boxed(),
        };
        layers.push(layer);
    }

    if config.console.enabled {
        let use_ansi = config.console.colored && std::io::stdout().is_terminal();
        layers.push(
            fmt::layer()
                .with_ansi(use_ansi)
                .with_target(true)
                .with_level(true)
                .boxed(),
        );
    }

    Ok(layers)
}

fn open_log_file(config: &FileConfig) -> Result<File, LoggerError> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if config.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    Ok(options.open(&config.path)?)
}
