//! Storage ports.
//!
//! One repository trait per entity. The ingestion pipeline depends only on
//! these traits; [`SqlStore`](crate::SqlStore) and
//! [`MemoryStore`](crate::MemoryStore) implement all three.
//!
//! Every mutating call is its own all-or-nothing unit: it either fully
//! applies or leaves the store unchanged.

use std::future::Future;

use openvas_sync_core::types::{Finding, FindingRecord, Report, Vulnerability};

use crate::error::StoreError;

/// Report persistence.
pub trait ReportRepository: Send + Sync {
    /// Inserts a report.
    ///
    /// # Errors
    ///
    /// `StoreError::DuplicateKey` if `report.report_id` already exists.
    fn create_report(
        &self,
        report: &Report,
    ) -> impl Future<Output = Result<Report, StoreError>> + Send;

    /// Looks a report up by id.
    fn get_report(
        &self,
        report_id: &str,
    ) -> impl Future<Output = Result<Option<Report>, StoreError>> + Send;

    /// All reports ordered by id.
    fn list_reports(&self) -> impl Future<Output = Result<Vec<Report>, StoreError>> + Send;

    /// Replaces every attribute of an existing report.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the report does not exist.
    fn update_report(
        &self,
        report: &Report,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a report together with its findings.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the report does not exist.
    fn delete_report(
        &self,
        report_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Vulnerability definitions, unique by name.
pub trait VulnerabilityRepository: Send + Sync {
    /// Returns the stored vulnerability with the same name, or the same
    /// `vuln_id`, inserting `vuln` only when neither exists.
    ///
    /// The existing row is never modified (first writer wins). The
    /// insert-if-absent is atomic, so concurrent callers converge on one row.
    fn find_or_create_vulnerability(
        &self,
        vuln: &Vulnerability,
    ) -> impl Future<Output = Result<Vulnerability, StoreError>> + Send;

    /// Looks a vulnerability up by id.
    fn get_vulnerability(
        &self,
        vuln_id: &str,
    ) -> impl Future<Output = Result<Option<Vulnerability>, StoreError>> + Send;

    /// Looks a vulnerability up by its natural key.
    fn find_vulnerability_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Vulnerability>, StoreError>> + Send;

    /// All vulnerabilities ordered by name.
    fn list_vulnerabilities(
        &self,
    ) -> impl Future<Output = Result<Vec<Vulnerability>, StoreError>> + Send;

    /// Replaces the attributes of an existing vulnerability.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound`: no vulnerability with `vuln.vuln_id`
    /// - `StoreError::DuplicateKey`: the new name belongs to another row
    fn update_vulnerability(
        &self,
        vuln: &Vulnerability,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a vulnerability.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound`: no such vulnerability
    /// - `StoreError::ForeignKey`: findings still reference it
    fn delete_vulnerability(
        &self,
        vuln_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Report-vulnerability associations (findings).
pub trait FindingRepository: Send + Sync {
    /// Inserts a finding and assigns its id.
    ///
    /// # Errors
    ///
    /// `StoreError::ForeignKey` if the report or vulnerability does not exist.
    fn create_finding(
        &self,
        record: &FindingRecord,
    ) -> impl Future<Output = Result<Finding, StoreError>> + Send;

    /// Looks a finding up by id.
    fn get_finding(
        &self,
        finding_id: &str,
    ) -> impl Future<Output = Result<Option<Finding>, StoreError>> + Send;

    /// All findings.
    fn list_findings(&self) -> impl Future<Output = Result<Vec<Finding>, StoreError>> + Send;

    /// Findings belonging to one report.
    fn list_findings_for_report(
        &self,
        report_id: &str,
    ) -> impl Future<Output = Result<Vec<Finding>, StoreError>> + Send;

    /// Replaces the attributes of an existing finding.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound`: no such finding
    /// - `StoreError::ForeignKey`: new report or vulnerability does not exist
    fn update_finding(
        &self,
        finding: &Finding,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a finding.
    fn delete_finding(
        &self,
        finding_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Everything the ingestion pipeline needs from storage.
pub trait Store: ReportRepository + VulnerabilityRepository + FindingRepository {}

impl<T> Store for T where T: ReportRepository + VulnerabilityRepository + FindingRepository {}
