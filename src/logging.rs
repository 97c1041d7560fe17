use crate::error::{Result, SetupError};
use chrono::Local;
use env_logger::{Builder, Env};
use log::{self, LevelFilter};
use std::io::Write;
use yansi::Paint;

/// Initializes the application's logging system with the specified log level
///
/// `RUST_LOG` takes precedence over `log_level` when set.
/// Valid log levels are: off, error, warn, info, debug, trace
pub fn init(log_level: &str) -> Result<()> {
    let level = parse_log_level(log_level).to_string();
    let env = Env::default()
        .filter_or("RUST_LOG", level)
        .write_style_or("RUST_LOG_STYLE", "auto");

    Builder::from_env(env)
        .format(|buf, record| writeln!(buf, "{}", format_log(record)))
        .try_init()
        .map_err(|e| SetupError::Config(format!("Logger already initialized: {}", e)))
}

/// Formats a log record as `[timestamp] LEVEL [target] message`
pub fn format_log(record: &log::Record) -> String {
    let level = match record.level() {
        log::Level::Error => Paint::red("ERROR").bold(),
        log::Level::Warn => Paint::yellow("WARN ").bold(),
        log::Level::Info => Paint::cyan("INFO ").bold(),
        log::Level::Debug => Paint::blue("DEBUG").bold(),
        log::Level::Trace => Paint::new("TRACE"),
    };

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let target = if !record.target().is_empty() {
        record.target()
    } else {
        record.module_path().unwrap_or("unknown")
    };

    format!("[{}] {} [{}] {}", timestamp, level, target, record.args())
}

/// Parses a log level string into a LevelFilter
///
/// Returns the corresponding LevelFilter, defaulting to Info for invalid strings
pub fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("error", LevelFilter::Error)]
    #[test_case("WARN", LevelFilter::Warn)]
    #[test_case("info", LevelFilter::Info)]
    #[test_case("debug", LevelFilter::Debug)]
    #[test_case("trace", LevelFilter::Trace)]
    #[test_case("off", LevelFilter::Off)]
    #[test_case("invalid", LevelFilter::Info; "unknown falls back to info")]
    fn test_parse_log_level(level: &str, expected: LevelFilter) {
        assert_eq!(parse_log_level(level), expected);
    }

    #[test]
    fn test_format_log_contains_target_and_message() {
        let line = format_log(
            &log::Record::builder()
                .args(format_args!("worksheet updated"))
                .level(log::Level::Info)
                .target("leo_setup::worksheet")
                .build(),
        );
        assert!(line.contains("[leo_setup::worksheet] worksheet updated"));
    }
}
