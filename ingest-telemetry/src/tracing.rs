use std::path::Path;
use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// File name prefix of the rolling log written into the working directory.
const LOG_FILE_PREFIX: &str = "ingester.log";

/// Environment variable enabling log output in tests.
const ENABLE_TEST_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to create the log directory `{0}`: {1}")]
    LogDirectory(String, #[source] std::io::Error),

    #[error("failed to bridge `log` records into tracing: {0}")]
    LogTracer(#[from] tracing_log::log_tracer::SetLoggerError),

    #[error("failed to install the global tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs the global subscriber for a binary.
///
/// Events go to stdout and to a daily rolling file in `log_dir`. The filter comes from
/// `RUST_LOG` and defaults to `info` for `app_name` and the engine crate. The returned guard
/// flushes the file writer on drop and must be kept alive until the process exits.
pub fn init_tracing(app_name: &str, log_dir: &Path) -> Result<WorkerGuard, TracingError> {
    std::fs::create_dir_all(log_dir)
        .map_err(|err| TracingError::LogDirectory(log_dir.display().to_string(), err))?;

    tracing_log::LogTracer::init()?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}=info,ingest=info", app_name.replace('-', "_")).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;

    Ok(guard)
}

/// Installs a test subscriber once per process.
///
/// Output is only produced when `ENABLE_TRACING` is set, and goes through the test harness
/// capture so that it is shown for failing tests only.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TEST_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "ingest=debug".into());

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
