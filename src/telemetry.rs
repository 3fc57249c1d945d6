//! Subscriber setup for the terminal front-end.
//!
//! Logs go to a daily rolling file so they never interleave with the chat
//! transcript on stdout.

use crate::config::{ClientConfig, LogFormat};
use crate::error::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "luna-chat.log";
const DEFAULT_FILTER: &str = "luna_chat=info";

/// Installs the global subscriber. Keep the guard alive until exit or buffered
/// lines are lost.
pub fn init(config: &ClientConfig) -> Result<WorkerGuard> {
    let log_dir = config.log_dir()?;
    std::fs::create_dir_all(&log_dir)?;

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init(),
    }

    tracing::info!(log_dir = %log_dir.display(), "Logging initialized");
    Ok(guard)
}
