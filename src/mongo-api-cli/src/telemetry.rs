//! Tracing setup for the command line client
//!
//! Human-readable events go to stderr so stdout carries only the result
//! record. When a log directory is configured, JSON events are also written to
//! `mongo-api-cli.log` there, rotated daily or at 10MB.

use anyhow::Result;
use rolling_file::{RollingConditionBasic, RollingFileAppender};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "mongo_api_cli=info,mongo_api_rs=info,mongo_api_core=info";

/// Install the global subscriber.
///
/// The returned guard must be kept alive until exit so buffered file logs are
/// flushed.
pub fn init_telemetry(log_dir: Option<&str>) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let log_dir = Path::new(dir);
            std::fs::create_dir_all(log_dir)?;

            let file_appender = RollingFileAppender::new(
                log_dir.join("mongo-api-cli.log"),
                RollingConditionBasic::new()
                    .daily()
                    .max_size(10 * 1024 * 1024), // 10 MB
                9,
            )?;
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_current_span(true)
                .with_target(true)
                .with_thread_ids(true);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    if let Some(dir) = log_dir {
        tracing::debug!("File logging to {}", dir);
    }

    Ok(guard)
}
