use std::env;

use dotenvy::dotenv;
use fern::Dispatch;
use snafu::ResultExt;

use crate::errors::{CustomResult, IoSnafu, LoggingSnafu};

pub fn setup_logging() -> CustomResult<()> {
    dotenv().ok();
    // get log level, default to info
    let verbosity = env::var("LOGGING_LEVEL").unwrap_or_else(|_| "INFO".to_string());
    let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "timekeeper.log".to_string());

    let mut base_config = fern::Dispatch::new();

    base_config = match verbosity.as_str() {
        "OFF" => base_config.level(log::LevelFilter::Off),
        "ERROR" => base_config.level(log::LevelFilter::Error),
        "WARN" => base_config.level(log::LevelFilter::Warn),
        "DEBUG" => base_config.level(log::LevelFilter::Debug),
        "TRACE" => base_config.level(log::LevelFilter::Trace),
        _ => base_config.level(log::LevelFilter::Info),
    };

    let logger_config = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S%.3f]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(std::io::stdout())
        .chain(fern::log_file(log_file).context(IoSnafu)?);

    base_config
        .chain(logger_config)
        .apply()
        .map_err(fern::InitError::SetLoggerError)
        .context(LoggingSnafu)?;

    Ok(())
}
