use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "ADT_LOG";

/// Keeps the background log writer alive. Dropping it flushes pending lines.
pub struct LoggingGuard {
    _guard: Option<WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Where log files go, or `None` when logging to stderr.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber.
///
/// Logs go to a daily rolling file under `log_dir`; if that directory cannot
/// be created they go to stderr. A second call is a no-op.
pub fn init(log_dir: Option<&Path>, default_level: &str) -> LoggingGuard {
    let filter = env_filter(default_level);

    if let Some(dir) = log_dir.filter(|d| std::fs::create_dir_all(d).is_ok()) {
        let file_appender = tracing_appender::rolling::daily(dir, "adt.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let initialized = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true),
            )
            .try_init()
            .is_ok();
        if initialized {
            tracing::info!(log_dir = %dir.display(), "tracing initialized");
        }
        return LoggingGuard {
            _guard: Some(guard),
            log_dir: Some(dir.to_path_buf()),
        };
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
    LoggingGuard {
        _guard: None,
        log_dir: None,
    }
}
