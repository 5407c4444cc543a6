use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct LogSettings {
    pub log_path: String,
    pub log_level: String,
    pub log_file_name: String,
    pub log_overwrite: bool,
}

pub fn setup_logging(log_level: &str, log_file_path: PathBuf) -> Result<Config, Box<dyn Error>> {
    let log_level = get_logging_level(log_level);
    let log_file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y.%m.%d %H:%M:%S)} | {({l}):5.5} | {({f}:{L}):>40.40} — {m}{n}",
        )))
        .build(log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("x", Box::new(log_file)))
        .build(Root::builder().appender("x").build(log_level))?;
    Ok(config)
}

pub fn get_logging_level(log_level: &str) -> LevelFilter {
    match log_level {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Picks a file name that does not clobber an earlier log unless overwriting is allowed.
pub fn log_file_path(log_dir: &Path, log_settings: &LogSettings) -> PathBuf {
    let log_file_path = log_dir.join(&log_settings.log_file_name);
    if !log_file_path.exists() || log_settings.log_overwrite {
        return log_file_path;
    }
    let stamp = Utc::now().format("_%d%m%Y_%H%M%S").to_string();
    let stem = log_settings
        .log_file_name
        .split('.')
        .next()
        .unwrap_or("hovis");
    log_dir.join(format!("{}{}.log", stem, stamp))
}

/// Routes the `log` facade into a file under `config_path/log_path/logs`.
pub fn initiate_logger(config_path: &Path, log_settings: &LogSettings) {
    let log_dir = config_path.join(&log_settings.log_path).join("logs");
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)
            .unwrap_or_else(|e| panic!("Error while creating the log directory: {}", e));
    }

    let log_file_path = log_file_path(&log_dir, log_settings);
    if log_file_path.exists() {
        fs::remove_file(&log_file_path)
            .unwrap_or_else(|e| panic!("Error while clearing the log file: {}", e));
    }

    let logger_config = match setup_logging(&log_settings.log_level, log_file_path) {
        Ok(logger_config) => logger_config,
        Err(e) => {
            panic!("Error while configuring the logger: {}", e);
        }
    };

    match log4rs::init_config(logger_config) {
        Ok(_) => {}
        Err(e) => {
            panic!("Error while initializing logger with config: {}", e);
        }
    };
}

/// Logs to stderr, filtered by `RUST_LOG`, with `default_level` when the variable is unset.
/// Standard output stays reserved for the telemetry stream.
pub fn initiate_stderr_logger(default_level: &str) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.to_string()),
    )
    .target(env_logger::Target::Stderr)
    .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_default_to_info() {
        assert_eq!(get_logging_level("debug"), LevelFilter::Debug);
        assert_eq!(get_logging_level("verbose"), LevelFilter::Info);
    }

    #[test]
    fn missing_log_file_keeps_its_name() {
        let settings = LogSettings {
            log_path: "out".to_string(),
            log_level: "info".to_string(),
            log_file_name: "hovis.log".to_string(),
            log_overwrite: false,
        };
        let dir = std::env::temp_dir().join("hovis-logger-test-missing");
        assert_eq!(log_file_path(&dir, &settings), dir.join("hovis.log"));
    }
}
