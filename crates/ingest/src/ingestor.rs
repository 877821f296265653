//! Ingestion orchestrator.
//!
//! One pass per invocation: list report ids, then for each report fetch,
//! decode, extract metadata, persist the report, and parse and persist its
//! rows. Listing failures end the run; everything after that is recovered per
//! report or per row and recorded in the [`IngestSummary`].

use std::future::Future;
use std::time::Instant;

use openvas_sync_core::metrics as m;
use openvas_sync_gmp::{Envelope, GmpClientError, ReportSource};
use openvas_sync_storage::{Store, StoreError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DuplicateReportPolicy, IngestConfig, RowFailurePolicy};
use crate::error::IngestError;
use crate::metadata::extract_metadata;
use crate::payload::ArtifactStore;
use crate::rows::{ParsedRow, parse_rows};
use crate::summary::{IngestStage, IngestSummary, SkipRecord};

enum Outcome {
    Ingested { rows: usize },
    Skipped(String),
    Failed,
    Cancelled,
}

/// Drives reports from a [`ReportSource`] into a [`Store`].
///
/// # Example
///
/// ```ignore
/// let ingestor = Ingestor::new(IngestConfig::from_core(&config)?, &store)
///     .with_cancellation(token.clone());
/// let summary = ingestor.run(&mut session).await?;
/// ```
pub struct Ingestor<'a, St: Store> {
    store: &'a St,
    artifacts: ArtifactStore,
    config: IngestConfig,
    cancel: CancellationToken,
}

impl<'a, St: Store> Ingestor<'a, St> {
    /// Creates an ingestor writing artifacts under `config.data_dir`.
    pub fn new(config: IngestConfig, store: &'a St) -> Self {
        Self {
            store,
            artifacts: ArtifactStore::new(config.data_dir.clone()),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to stop the run early.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Artifact store used for decoded payloads.
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Runs one ingestion pass.
    ///
    /// # Errors
    ///
    /// Only a failed report listing is returned as an error. Per report and
    /// per row failures are recorded in the summary.
    pub async fn run<S: ReportSource>(&self, source: &mut S) -> Result<IngestSummary, IngestError> {
        let mut summary = IngestSummary::default();

        let Some(listed) = self.cancellable(source.list_report_ids()).await else {
            summary.cancelled = true;
            info!("ingestion cancelled before the report list arrived");
            return Ok(summary);
        };
        let report_ids = listed?;
        summary.reports_listed = report_ids.len();
        info!(reports = report_ids.len(), "report list fetched");

        for report_id in &report_ids {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let started = Instant::now();
            let outcome = self.ingest_report(source, report_id, &mut summary).await;
            metrics::histogram!(m::INGEST_REPORT_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());

            match outcome {
                Outcome::Ingested { rows } => {
                    summary.reports_succeeded += 1;
                    summary.rows_succeeded += rows;
                    metrics::counter!(m::INGEST_REPORTS_TOTAL, m::LABEL_RESULT => m::RESULT_INGESTED)
                        .increment(1);
                }
                Outcome::Skipped(reason) => {
                    summary.reports_skipped += 1;
                    summary.skipped.push(SkipRecord {
                        report_id: report_id.clone(),
                        reason,
                    });
                    metrics::counter!(m::INGEST_REPORTS_TOTAL, m::LABEL_RESULT => m::RESULT_SKIPPED)
                        .increment(1);
                }
                Outcome::Failed => {
                    summary.reports_failed += 1;
                    metrics::counter!(m::INGEST_REPORTS_TOTAL, m::LABEL_RESULT => m::RESULT_FAILED)
                        .increment(1);
                }
                Outcome::Cancelled => {
                    summary.cancelled = true;
                    break;
                }
            }
        }

        info!(
            succeeded = summary.reports_succeeded,
            skipped = summary.reports_skipped,
            failed = summary.reports_failed,
            rows_succeeded = summary.rows_succeeded,
            rows_failed = summary.rows_failed,
            cancelled = summary.cancelled,
            "ingestion finished"
        );
        Ok(summary)
    }

    async fn ingest_report<S: ReportSource>(
        &self,
        source: &mut S,
        report_id: &str,
        summary: &mut IngestSummary,
    ) -> Outcome {
        // Re-runs skip the download entirely.
        match self.store.get_report(report_id).await {
            Ok(Some(_)) => return self.on_duplicate(report_id, summary),
            Ok(None) => {}
            Err(e) => return fail(summary, report_id, IngestStage::PersistReport, e),
        }

        let format_id = self.config.report_format_id.as_str();
        let envelope = match self.fetch(source, report_id, format_id).await {
            Some(Ok(envelope)) => envelope,
            Some(Err(e)) => return fail(summary, report_id, fetch_stage(&e), e),
            None => return Outcome::Cancelled,
        };

        let payload = match self.artifacts.store_payload(report_id, &envelope).await {
            Ok(payload) => payload,
            Err(e) => return fail(summary, report_id, IngestStage::Decode, e),
        };

        let metadata_envelope = match &self.config.metadata_format_id {
            Some(format_id) => match self.fetch(source, report_id, format_id).await {
                Some(Ok(envelope)) => Some(envelope),
                Some(Err(e)) => return fail(summary, report_id, fetch_stage(&e), e),
                None => return Outcome::Cancelled,
            },
            None => None,
        };
        let report = match extract_metadata(report_id, metadata_envelope.as_ref().unwrap_or(&envelope)) {
            Ok(report) => report,
            Err(e) => return fail(summary, report_id, IngestStage::Metadata, e),
        };

        match self.store.create_report(&report).await {
            Ok(_) => {}
            Err(StoreError::DuplicateKey { .. }) => return self.on_duplicate(report_id, summary),
            Err(e) => return fail(summary, report_id, IngestStage::PersistReport, e),
        }

        let Some(csv) = payload else {
            info!(report_id, "report has no payload, stored metadata only");
            return Outcome::Ingested { rows: 0 };
        };

        let mut stored = 0usize;
        for parsed in parse_rows(report_id, &csv) {
            if self.cancel.is_cancelled() {
                self.discard(report_id).await;
                return Outcome::Cancelled;
            }

            let (row_index, stage, result) = match parsed {
                Ok(row) => (row.row_index, IngestStage::PersistRow, self.persist_row(row).await),
                Err(e) => (e.row_index, IngestStage::ParseRow, Err(IngestError::from(e))),
            };
            match result {
                Ok(()) => {
                    stored += 1;
                    metrics::counter!(m::INGEST_ROWS_TOTAL, m::LABEL_RESULT => m::RESULT_STORED)
                        .increment(1);
                }
                Err(e) => {
                    warn!(report_id, row = row_index, stage = %stage, error = %e, "row failed");
                    summary.rows_failed += 1;
                    summary.fail(report_id, Some(row_index), stage, e.to_string());
                    metrics::counter!(m::INGEST_ROWS_TOTAL, m::LABEL_RESULT => m::RESULT_FAILED)
                        .increment(1);
                    if self.config.on_row_error == RowFailurePolicy::AbortReport {
                        self.discard(report_id).await;
                        summary.fail(
                            report_id,
                            None,
                            stage,
                            format!("report aborted at row {row_index}"),
                        );
                        return Outcome::Failed;
                    }
                }
            }
        }

        info!(report_id, rows = stored, "report ingested");
        Outcome::Ingested { rows: stored }
    }

    async fn persist_row(&self, row: ParsedRow) -> Result<(), IngestError> {
        let vulnerability = self.store.find_or_create_vulnerability(&row.vulnerability).await?;
        let mut finding = row.finding;
        finding.vuln_id = vulnerability.vuln_id;
        self.store.create_finding(&finding).await?;
        Ok(())
    }

    fn on_duplicate(&self, report_id: &str, summary: &mut IngestSummary) -> Outcome {
        match self.config.on_duplicate_report {
            DuplicateReportPolicy::Skip => {
                info!(report_id, "report already ingested, skipping");
                Outcome::Skipped("already ingested".to_owned())
            }
            DuplicateReportPolicy::Fail => fail(
                summary,
                report_id,
                IngestStage::PersistReport,
                "report already ingested",
            ),
        }
    }

    /// Removes a partially ingested report so a later run starts clean.
    async fn discard(&self, report_id: &str) {
        match self.store.delete_report(report_id).await {
            Ok(()) => debug!(report_id, "partial report removed"),
            Err(e) => warn!(report_id, error = %e, "failed to remove partial report"),
        }
    }

    async fn fetch<S: ReportSource>(
        &self,
        source: &mut S,
        report_id: &str,
        format_id: &str,
    ) -> Option<Result<Envelope, GmpClientError>> {
        self.cancellable(source.fetch_report_envelope(report_id, format_id))
            .await
    }

    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

/// Unparsable envelopes count as decode failures.
fn fetch_stage(err: &GmpClientError) -> IngestStage {
    match err {
        GmpClientError::InvalidResponse(_) => IngestStage::Decode,
        _ => IngestStage::Fetch,
    }
}

fn fail(
    summary: &mut IngestSummary,
    report_id: &str,
    stage: IngestStage,
    reason: impl ToString,
) -> Outcome {
    let reason = reason.to_string();
    warn!(report_id, stage = %stage, reason = %reason, "report failed");
    summary.fail(report_id, None, stage, reason);
    Outcome::Failed
}
