//! Report transport abstraction.
//!
//! The [`ReportSource`] trait is what the ingestion orchestrator talks to.
//! [`GmpSession`] implements it against a live daemon; tests substitute a
//! scripted source.

use std::collections::HashSet;
use std::future::Future;

use tracing::debug;

use crate::command::{GmpCommand, validate_report_id};
use crate::connection::GmpSession;
use crate::envelope::Envelope;
use crate::error::GmpClientError;

/// Source of report envelopes.
///
/// Methods take `&mut self` because a GMP session serves one request at a
/// time.
pub trait ReportSource: Send {
    /// Lists the ids of all reports visible to the session, without duplicates.
    ///
    /// # Errors
    ///
    /// Any transport or protocol failure. Callers treat this as fatal for the run.
    fn list_report_ids(
        &mut self,
    ) -> impl Future<Output = Result<Vec<String>, GmpClientError>> + Send;

    /// Fetches one report rendered in `format_id`, with pagination disabled and
    /// full details.
    ///
    /// # Errors
    ///
    /// - `GmpClientError::InvalidReportId`: `report_id` failed validation
    /// - `GmpClientError::CommandFailed`: unknown id or daemon-side error
    fn fetch_report_envelope(
        &mut self,
        report_id: &str,
        format_id: &str,
    ) -> impl Future<Output = Result<Envelope, GmpClientError>> + Send;
}

impl ReportSource for GmpSession {
    async fn list_report_ids(&mut self) -> Result<Vec<String>, GmpClientError> {
        let filter = self.report_filter().to_owned();
        let envelope = self
            .request(&GmpCommand::GetReports { filter: &filter })
            .await?;
        let ids = report_ids(&envelope);
        debug!(count = ids.len(), "listed reports");
        Ok(ids)
    }

    async fn fetch_report_envelope(
        &mut self,
        report_id: &str,
        format_id: &str,
    ) -> Result<Envelope, GmpClientError> {
        validate_report_id(report_id)?;
        self.request(&GmpCommand::GetReport {
            report_id,
            format_id,
            details: true,
        })
        .await
    }
}

/// Extracts `report/@id` from a `get_reports` response, keeping first-seen order.
pub fn report_ids(envelope: &Envelope) -> Vec<String> {
    let mut seen = HashSet::new();
    envelope
        .root()
        .children_named("report")
        .filter_map(|report| report.attr("id"))
        .filter(|id| seen.insert(*id))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_ids_are_unique_and_ordered() {
        let env = Envelope::parse(
            r#"<get_reports_response status="200" status_text="OK">
                 <report id="b"><report id="b"/></report>
                 <report id="a"/>
                 <report id="b"/>
                 <report/>
                 <filters id=""/>
               </get_reports_response>"#,
        )
        .unwrap();
        assert_eq!(report_ids(&env), vec!["b".to_owned(), "a".to_owned()]);
    }

    #[test]
    fn empty_listing_yields_no_ids() {
        let env = Envelope::parse(r#"<get_reports_response status="200" status_text="OK"/>"#)
            .unwrap();
        assert!(report_ids(&env).is_empty());
    }
}
