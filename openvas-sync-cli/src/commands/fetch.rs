//! `openvas-sync fetch` command handler

use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use openvas_sync_core::config::SyncConfig;
use openvas_sync_gmp::{GmpClientConfig, GmpConnector};
use openvas_sync_ingest::{IngestConfig, IngestSummary, Ingestor};
use openvas_sync_storage::{MemoryStore, SqlStore, Store, StoreConfig};

use crate::cli::FetchArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `fetch` command.
///
/// Exits with [`CliError::IngestIncomplete`] after rendering the summary
/// when any report or row failed.
pub async fn execute(
    args: FetchArgs,
    mut config: SyncConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    apply_overrides(&args, &mut config);
    let _scratch = dry_run_data_dir(&args, &mut config)?;
    config.validate()?;
    config.require_gmp()?;
    if !args.dry_run {
        config.require_database()?;
    }

    let ingest_config = IngestConfig::from_core(&config)?;
    let connector = GmpConnector::new(GmpClientConfig::from_core(&config.gmp))?;

    let cancel = CancellationToken::new();
    let signal = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = if args.dry_run {
        info!(data_dir = %config.general.data_dir, "dry run, results are kept in memory");
        let store = MemoryStore::new();
        run_pass(&connector, &store, ingest_config, cancel).await
    } else {
        let store_config = StoreConfig::from_core(&config.database)?;
        info!(database = %store_config.redacted_url(), "connecting to database");
        let store = SqlStore::connect(&store_config).await?;
        let result = run_pass(&connector, &store, ingest_config, cancel).await;
        store.close().await;
        result
    };
    signal.abort();

    let report = FetchReport {
        dry_run: args.dry_run,
        summary: result?,
    };
    writer.render(&report)?;

    if report.summary.has_failures() {
        return Err(CliError::IngestIncomplete(report.summary.to_string()));
    }
    Ok(())
}

fn apply_overrides(args: &FetchArgs, config: &mut SyncConfig) {
    if let Some(policy) = args.on_duplicate {
        config.ingest.on_duplicate_report = policy.as_config_value().to_owned();
    }
    if let Some(policy) = args.on_row_error {
        config.ingest.on_row_error = policy.as_config_value().to_owned();
    }
    if let Some(dir) = &args.data_dir {
        config.general.data_dir = dir.display().to_string();
    }
}

/// Points a dry run without `--data-dir` at a scratch directory so artifacts
/// from earlier real runs are left alone. The directory lives as long as the
/// returned guard.
fn dry_run_data_dir(
    args: &FetchArgs,
    config: &mut SyncConfig,
) -> Result<Option<TempDir>, CliError> {
    if !args.dry_run || args.data_dir.is_some() {
        return Ok(None);
    }
    let scratch = tempfile::Builder::new()
        .prefix("openvas-sync-dry-run-")
        .tempdir()?;
    config.general.data_dir = scratch.path().display().to_string();
    Ok(Some(scratch))
}

/// Authenticates, runs one pass, and always closes the session.
async fn run_pass<St: Store>(
    connector: &GmpConnector,
    store: &St,
    ingest_config: IngestConfig,
    cancel: CancellationToken,
) -> Result<IngestSummary, CliError> {
    let mut session = connector.connect().await?;
    let result = Ingestor::new(ingest_config, store)
        .with_cancellation(cancel)
        .run(&mut session)
        .await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close gmp session");
    }
    Ok(result?)
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, stopping after the current step");
        token.cancel();
    }
}

/// Result of one ingestion pass.
#[derive(Serialize)]
pub struct FetchReport {
    /// Whether results were kept in memory only
    pub dry_run: bool,
    /// Counts and failure records
    #[serde(flatten)]
    pub summary: IngestSummary,
}

impl Render for FetchReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let s = &self.summary;
        let title = if self.dry_run {
            "Ingestion Summary (dry run)"
        } else {
            "Ingestion Summary"
        };
        writeln!(w, "{}", title.bold())?;
        writeln!(
            w,
            "  Reports: {} listed, {} succeeded, {} skipped, {} failed",
            s.reports_listed, s.reports_succeeded, s.reports_skipped, s.reports_failed
        )?;
        writeln!(
            w,
            "  Rows:    {} succeeded, {} failed",
            s.rows_succeeded, s.rows_failed
        )?;
        if s.cancelled {
            writeln!(
                w,
                "  {} ({} reports not processed)",
                "Cancelled".yellow().bold(),
                s.reports_pending()
            )?;
        }

        if !s.skipped.is_empty() {
            writeln!(w)?;
            writeln!(w, "Skipped:")?;
            for skip in &s.skipped {
                writeln!(w, "  {}: {}", skip.report_id, skip.reason)?;
            }
        }

        if !s.failures.is_empty() {
            writeln!(w)?;
            writeln!(w, "Failures:")?;
            for failure in &s.failures {
                let location = match failure.row_index {
                    Some(row) => format!("{} row {}", failure.report_id, row),
                    None => failure.report_id.clone(),
                };
                writeln!(
                    w,
                    "  {} [{}] {}",
                    location,
                    failure.stage,
                    failure.reason.red()
                )?;
            }
        }
        Ok(())
    }
}
