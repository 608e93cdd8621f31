use std::env;
use std::io::Write;
use std::sync::OnceLock;

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};

pub const LOG_LEVEL_ENV: &str = "EMOTION_ANALYZER_LOG";

static LOGGER_INIT: OnceLock<()> = OnceLock::new();
static LOGGER: StderrLogger = StderrLogger;

/// Writes `timestamp [LEVEL] target - message` lines to stderr.
pub struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            std::io::stderr().lock(),
            "{} [{}] {} - {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs the stderr logger once. The level comes from
/// `EMOTION_ANALYZER_LOG` and defaults to `info`.
pub fn init() {
    LOGGER_INIT.get_or_init(|| {
        let level = parse_level(env::var(LOG_LEVEL_ENV).ok().as_deref());
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level);
        }
    });
}

fn parse_level(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_defaults_to_info() {
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("loud")), LevelFilter::Info);
    }

    #[test]
    fn level_is_case_insensitive() {
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" warn ")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("off")), LevelFilter::Off);
    }

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
