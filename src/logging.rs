//! Tracing setup for the pinboard server.
//!
//! Pinboard's own events and the HTTP trace layer follow the configured
//! level. sqlx is held at `warn` so per-statement logging stays quiet, and
//! everything else at `warn` too. A `RUST_LOG` value replaces these defaults
//! entirely.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{PinboardError, Result};

/// Canonical level name for a configured level; unknown values mean `info`.
fn level_name(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(level: &str) -> String {
    let level = level_name(level);
    format!("warn,pinboard={level},tower_http={level},sqlx=warn")
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Open the log file for appending, creating it and its directory.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber.
///
/// Lines always go to stdout, and also to `config.file` unless it is empty.
/// ANSI colours are used only when stdout is the sole sink. Fails if the file
/// cannot be opened or a subscriber is already installed; nothing is
/// installed in either case.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let file = if config.file.is_empty() {
        None
    } else {
        Some(open_log_file(Path::new(&config.file))?)
    };

    let ansi = file.is_none();
    let writer = match file {
        Some(file) => BoxMakeWriter::new(std::io::stdout.and(Arc::new(file))),
        None => BoxMakeWriter::new(std::io::stdout),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true),
        )
        .with(env_filter(&config.level))
        .try_init()
        .map_err(|e| PinboardError::Config(format!("logging: {e}")))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(level_name("DEBUG"), "debug");
        assert_eq!(level_name(" warning "), "warn");
        assert_eq!(level_name("verbose"), "info");
        assert_eq!(level_name(""), "info");
    }

    #[test]
    fn test_default_directives_parse() {
        let directives = default_directives("debug");
        assert_eq!(directives, "warn,pinboard=debug,tower_http=debug,sqlx=warn");
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_log_file_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("pinboard.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
