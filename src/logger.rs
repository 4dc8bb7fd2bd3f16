//! Stderr backend for the `log` facade, used by the `glang` binary.
//!
//! The level comes from the `GLANG_LOG` environment variable (`error`, `warn`,
//! `info`, `debug`, `trace` or `off`, any case). Anything else, or no
//! variable at all, means `warn`.

use std::{io::Write, str::FromStr};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub const LOG_ENV: &str = "GLANG_LOG";

const DEFAULT_LEVEL: LevelFilter = LevelFilter::Warn;

static LOGGER: StderrLogger = StderrLogger;

#[derive(Debug)]
pub struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        // Nowhere left to report a failed write to stderr.
        let _ = writeln!(
            handle,
            "{:<5} {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs [`StderrLogger`] with the level named by [`LOG_ENV`].
pub fn init() -> Result<(), SetLoggerError> {
    let level = parse_level(std::env::var(LOG_ENV).ok().as_deref());

    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

pub fn parse_level(value: Option<&str>) -> LevelFilter {
    value
        .map(str::trim)
        .and_then(|v| LevelFilter::from_str(v).ok())
        .unwrap_or(DEFAULT_LEVEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level(Some("trace")), LevelFilter::Trace);
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" Info ")), LevelFilter::Info);
        assert_eq!(parse_level(Some("off")), LevelFilter::Off);
    }

    #[test]
    fn unknown_or_missing_level_is_warn() {
        assert_eq!(parse_level(None), LevelFilter::Warn);
        assert_eq!(parse_level(Some("")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("loud")), LevelFilter::Warn);
    }
}
