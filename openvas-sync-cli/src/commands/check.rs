//! `openvas-sync check` command handler

use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use tracing::{debug, info};

use openvas_sync_core::config::SyncConfig;
use openvas_sync_gmp::{GmpClientConfig, GmpConnector};
use openvas_sync_storage::{SqlStore, StoreConfig};

use crate::cli::CheckArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `check` command.
///
/// Every selected target is checked even if an earlier one fails; the first
/// failure decides the exit code.
pub async fn execute(
    args: CheckArgs,
    config: &SyncConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let both = !args.gmp && !args.database;
    let mut report = CheckReport { checks: Vec::new() };
    let mut first_error = None;

    if both || args.gmp {
        let result = check_gmp(config).await;
        report.record("gmp", &config.gmp.socket_path, result, &mut first_error);
    }
    if both || args.database {
        let result = check_database(config).await;
        report.record("database", &config.database.engine, result, &mut first_error);
    }

    writer.render(&report)?;
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Authenticates and asks gvmd for its protocol version.
async fn check_gmp(config: &SyncConfig) -> Result<String, CliError> {
    config.require_gmp()?;
    let connector = GmpConnector::new(GmpClientConfig::from_core(&config.gmp))?;
    let mut session = connector.connect().await?;
    let version = session.version().await?;
    session.close().await?;
    info!(version = %version, "gmp check passed");
    Ok(format!("authenticated, GMP {version}"))
}

/// Connects to the database and runs `SELECT 1`.
async fn check_database(config: &SyncConfig) -> Result<String, CliError> {
    config.require_database()?;
    let store_config = StoreConfig::from_core(&config.database)?;
    debug!(database = %store_config.redacted_url(), "checking database");
    let store = SqlStore::connect(&store_config).await?;
    let ping = store.ping().await;
    store.close().await;
    ping?;
    info!(engine = %store.dialect(), "database check passed");
    Ok(format!("connected to {}", store_config.redacted_url()))
}

/// Connectivity check results.
#[derive(Serialize)]
pub struct CheckReport {
    /// One entry per checked target
    pub checks: Vec<CheckResult>,
}

impl CheckReport {
    fn record(
        &mut self,
        target: &str,
        endpoint: &str,
        result: Result<String, CliError>,
        first_error: &mut Option<CliError>,
    ) {
        let (ok, detail) = match result {
            Ok(detail) => (true, detail),
            Err(e) => {
                let detail = e.to_string();
                if first_error.is_none() {
                    *first_error = Some(e);
                }
                (false, detail)
            }
        };
        self.checks.push(CheckResult {
            target: target.to_owned(),
            endpoint: endpoint.to_owned(),
            ok,
            detail,
        });
    }
}

/// One connectivity check.
#[derive(Serialize)]
pub struct CheckResult {
    /// `gmp` or `database`
    pub target: String,
    /// Socket path or database engine
    pub endpoint: String,
    /// Whether the check passed
    pub ok: bool,
    /// Version / connection details or the error message
    pub detail: String,
}

impl Render for CheckReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", "Connectivity Check".bold())?;
        for check in &self.checks {
            let status = if check.ok {
                "OK".green().bold()
            } else {
                "FAILED".red().bold()
            };
            writeln!(
                w,
                "  {:<10} {:<8} {} ({})",
                check.target, status, check.detail, check.endpoint
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;

    #[tokio::test]
    async fn missing_credentials_fail_both_checks() {
        let config = SyncConfig::default();
        let writer = OutputWriter::new(OutputFormat::Json);
        let err = execute(
            CheckArgs {
                gmp: false,
                database: false,
            },
            &config,
            &writer,
        )
        .await
        .unwrap_err();
        // gmp is checked first; its missing username is a configuration error
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("gmp.username"));
    }

    #[tokio::test]
    async fn sqlite_database_check_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = SyncConfig::default();
        config.database.engine = "sqlite".to_owned();
        config.database.url = tmp.path().join("check.db").display().to_string();

        let detail = check_database(&config).await.unwrap();
        assert!(detail.starts_with("connected to sqlite://"));
    }

    #[tokio::test]
    async fn unreachable_socket_is_scanner_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = SyncConfig::default();
        config.gmp.socket_path = tmp.path().join("gvmd.sock").display().to_string();
        config.gmp.username = "admin".to_owned();
        config.gmp.password = "secret".to_owned();

        let err = check_gmp(&config).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn record_keeps_first_error() {
        let mut report = CheckReport { checks: Vec::new() };
        let mut first = None;
        report.record("gmp", "/run/gvmd/gvmd.sock", Err(CliError::Scanner("down".to_owned())), &mut first);
        report.record("database", "postgres", Err(CliError::Database("down".to_owned())), &mut first);
        assert_eq!(first.map(|e| e.exit_code()), Some(3));
        assert!(report.checks.iter().all(|c| !c.ok));
    }
}
