use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::{
    fmt, fmt::time::UtcTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::error::{AppError, AppResult};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();
static LOGGER_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

const DEFAULT_LOG_DIRECTIVES: &str =
    "info,app::aggregate=debug,app::distribute=info,app::reconcile=info,app::db=info";
const LOG_FILE_NAME: &str = "opsledger.log";

/// Overrides the log directory for batch runs started outside the data
/// directory (cron, one-off reconciles).
pub const LOG_DIR_ENV: &str = "OPSLEDGER_LOG_DIR";

/// Log directory for a store at `db_path`: the `OPSLEDGER_LOG_DIR` override,
/// else `logs/` next to the database file.
pub fn resolve_log_dir(db_path: &Path) -> PathBuf {
    resolve_log_dir_with(std::env::var_os(LOG_DIR_ENV).map(PathBuf::from), db_path)
}

fn resolve_log_dir_with(override_dir: Option<PathBuf>, db_path: &Path) -> PathBuf {
    override_dir
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| {
            db_path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .join("logs")
        })
}

/// Installs the global subscriber: a daily rolling file under `log_dir`
/// plus console output. Later calls are no-ops.
pub fn init_logging(log_dir: &Path) -> AppResult<()> {
    LOGGER_INIT
        .get_or_try_init(|| {
            std::fs::create_dir_all(log_dir)?;

            let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let env_filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_DIRECTIVES))
                .map_err(|err| AppError::other(format!("invalid log directives: {err}")))?;

            LOGGER_GUARD
                .set(guard)
                .map_err(|_| AppError::other("logger already initialized"))?;

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_timer(UtcTime::rfc_3339()),
                )
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_timer(UtcTime::rfc_3339()),
                )
                .try_init()
                .map_err(|err| AppError::other(format!("failed to install subscriber: {err}")))?;

            Ok(())
        })
        .map(|_| ())
}
