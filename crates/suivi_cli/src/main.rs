//! `suivi` server entry point.
//!
//! # Responsibility
//! - Read configuration from flags and `SUIVI_*` environment variables.
//! - Initialize logging, open both stores, optionally reindex, then serve HTTP.

use clap::Parser;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use suivi_api::{build_router, AppServices};
use suivi_core::db::{open_db, open_index_db};
use suivi_core::{
    default_log_level, init_logging, Database, DbError, LoggingConfig, LoggingError, ServiceError,
};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "suivi", version, about = "Construction follow-up REST backend")]
struct Cli {
    /// Socket address to listen on.
    #[arg(long, env = "SUIVI_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Primary SQLite database file.
    #[arg(long, env = "SUIVI_DB_PATH", default_value = "suivi.sqlite3")]
    db_path: PathBuf,

    /// Search index SQLite database file.
    #[arg(long, env = "SUIVI_INDEX_PATH", default_value = "suivi-index.sqlite3")]
    index_path: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults by build mode.
    #[arg(long, env = "SUIVI_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for rolling log files.
    #[arg(long, env = "SUIVI_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Rebuild every search index from the primary store before serving.
    #[arg(long)]
    reindex: bool,
}

#[derive(Debug)]
enum CliError {
    Logging(LoggingError),
    Db(DbError),
    Reindex(ServiceError),
    Io(std::io::Error),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "logging init failed: {err}"),
            Self::Db(err) => write!(f, "database open failed: {err}"),
            Self::Reindex(err) => write!(f, "reindex failed: {err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CliError {}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        Self::Reindex(value)
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=cli status=error error={err}");
            eprintln!("suivi: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(&LoggingConfig::new(level, &cli.log_dir)?.with_stderr_echo(true))?;

    let db = Arc::new(Database::new(open_db(&cli.db_path)?));
    let index_db = Arc::new(Database::new(open_index_db(&cli.index_path)?));
    let services = AppServices::with_sqlite_index(db, index_db);

    if cli.reindex {
        for (entity, documents) in services.reindex_all()? {
            info!("event=reindex module=cli status=ok entity={entity} documents={documents}");
        }
    }

    let listener = TcpListener::bind(cli.bind).await?;
    info!(
        "event=server_start module=cli status=ok bind={} db_path={} index_path={}",
        listener.local_addr()?,
        cli.db_path.display(),
        cli.index_path.display()
    );

    axum::serve(listener, build_router(services))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=server_stop module=cli status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=shutdown_signal module=cli status=error error={err}");
    }
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn defaults_apply_without_flags() {
        let cli = Cli::try_parse_from(["suivi"]).unwrap();
        assert_eq!(cli.bind.to_string(), "127.0.0.1:8080");
        assert_eq!(cli.db_path.to_string_lossy(), "suivi.sqlite3");
        assert_eq!(cli.index_path.to_string_lossy(), "suivi-index.sqlite3");
        assert!(!cli.reindex);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "suivi",
            "--bind",
            "0.0.0.0:9000",
            "--db-path",
            "/tmp/a.sqlite3",
            "--log-level",
            "debug",
            "--reindex",
        ])
        .unwrap();
        assert_eq!(cli.bind.port(), 9000);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.reindex);
    }

    #[test]
    fn invalid_bind_is_rejected() {
        assert!(Cli::try_parse_from(["suivi", "--bind", "not-an-address"]).is_err());
    }
}
