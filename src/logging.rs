//! Tracing subscriber setup.
//!
//! Headless commands log to stderr. The TUI owns the terminal, so it logs to a
//! daily-rolling file under the data directory instead. `RUST_LOG` overrides the
//! default `info` level; `ReviewConfig::logging = false` installs nothing.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::ReviewConfig;

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Rolling file in the given directory (`chatfx.log.YYYY-MM-DD`).
    File,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Call once, early in `main`.
///
/// Returns the appender guard for file logging; dropping it flushes pending lines.
pub fn init(config: &ReviewConfig, target: LogTarget, log_dir: &Path) -> Option<WorkerGuard> {
    if !config.logging {
        return None;
    }

    match target {
        LogTarget::Stderr => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
                .with_target(false);
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(layer)
                .try_init();
            None
        }
        LogTarget::File => {
            if let Err(e) = std::fs::create_dir_all(log_dir) {
                eprintln!("logging disabled: cannot create {}: {e}", log_dir.display());
                return None;
            }
            let appender = tracing_appender::rolling::daily(log_dir, "chatfx.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(layer)
                .try_init();
            Some(guard)
        }
    }
}
