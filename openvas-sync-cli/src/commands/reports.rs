//! `openvas-sync reports` command handler

use std::collections::BTreeMap;
use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use openvas_sync_core::config::SyncConfig;
use openvas_sync_core::types::{Finding, Report, Vulnerability};
use openvas_sync_storage::{
    FindingRepository, ReportRepository, SqlStore, StoreConfig, VulnerabilityRepository,
};

use crate::cli::{ReportsAction, ReportsArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, or_dash, truncate};

/// Execute the `reports` command.
pub async fn execute(
    args: ReportsArgs,
    config: &SyncConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    config.require_database()?;
    let store = SqlStore::connect(&StoreConfig::from_core(&config.database)?).await?;
    let result = match args.action {
        ReportsAction::List => list(&store).await.and_then(|r| writer.render(&r)),
        ReportsAction::Show { report_id } => {
            show(&store, &report_id).await.and_then(|r| writer.render(&r))
        }
    };
    store.close().await;
    result
}

async fn list<S: ReportRepository>(store: &S) -> Result<ReportList, CliError> {
    let reports = store.list_reports().await?;
    Ok(ReportList { reports })
}

async fn show<S>(store: &S, report_id: &str) -> Result<ReportDetail, CliError>
where
    S: ReportRepository + VulnerabilityRepository + FindingRepository,
{
    let report = store
        .get_report(report_id)
        .await?
        .ok_or_else(|| CliError::Command(format!("report not found: {report_id}")))?;
    let findings = store.list_findings_for_report(report_id).await?;

    let mut vulnerabilities: BTreeMap<String, Vulnerability> = BTreeMap::new();
    for finding in &findings {
        let vuln_id = &finding.record.vuln_id;
        if vulnerabilities.contains_key(vuln_id) {
            continue;
        }
        if let Some(vuln) = store.get_vulnerability(vuln_id).await? {
            vulnerabilities.insert(vuln_id.clone(), vuln);
        }
    }

    Ok(ReportDetail {
        report,
        findings,
        vulnerabilities,
    })
}

/// Stored reports.
#[derive(Serialize)]
pub struct ReportList {
    pub reports: Vec<Report>,
}

impl Render for ReportList {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.reports.is_empty() {
            writeln!(w, "No reports stored.")?;
            return Ok(());
        }
        writeln!(
            w,
            "{:<38} {:<30} {:<12} {:>8} {:>8}  {}",
            "ID".bold(),
            "Name".bold(),
            "Status".bold(),
            "Severity".bold(),
            "Results".bold(),
            "Scan Start".bold()
        )?;
        for report in &self.reports {
            writeln!(
                w,
                "{:<38} {:<30} {:<12} {:>8.1} {:>8}  {}",
                report.report_id,
                truncate(&report.name, 30),
                report.scan_status.as_str(),
                report.severity,
                report.result_count,
                report.scan_start.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        writeln!(w)?;
        writeln!(w, "{} report(s)", self.reports.len())?;
        Ok(())
    }
}

/// One report with its findings.
#[derive(Serialize)]
pub struct ReportDetail {
    pub report: Report,
    pub findings: Vec<Finding>,
    /// Vulnerabilities referenced by the findings, keyed by id
    pub vulnerabilities: BTreeMap<String, Vulnerability>,
}

impl Render for ReportDetail {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let r = &self.report;
        writeln!(w, "Report {}", r.report_id.bold())?;
        writeln!(w, "  Name:      {}", r.name)?;
        writeln!(w, "  Owner:     {}", r.owner_name)?;
        writeln!(w, "  Status:    {}", r.scan_status)?;
        writeln!(w, "  Created:   {}", r.creation_time.to_rfc3339())?;
        writeln!(w, "  Modified:  {}", r.modification_time.to_rfc3339())?;
        let scan_end = r
            .scan_end
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_owned());
        writeln!(w, "  Scan:      {} .. {}", r.scan_start.to_rfc3339(), scan_end)?;
        writeln!(w, "  Severity:  {:.1}", r.severity)?;
        writeln!(w, "  Results:   {}", r.result_count)?;
        writeln!(w)?;

        if self.findings.is_empty() {
            writeln!(w, "No findings stored.")?;
            return Ok(());
        }
        writeln!(
            w,
            "{:<16} {:<10} {:>6} {:<10}  {}",
            "Host".bold(),
            "Port".bold(),
            "CVSS".bold(),
            "Severity".bold(),
            "Vulnerability".bold()
        )?;
        for finding in &self.findings {
            let record = &finding.record;
            let vuln = self.vulnerabilities.get(&record.vuln_id);
            let port = match (record.port.as_deref(), record.protocol.as_deref()) {
                (Some(port), Some(proto)) => format!("{port}/{proto}"),
                (port, _) => or_dash(port).to_owned(),
            };
            let cvss = vuln
                .and_then(|v| v.cvss_base)
                .map(|c| format!("{c:.1}"))
                .unwrap_or_else(|| "-".to_owned());
            writeln!(
                w,
                "{:<16} {:<10} {:>6} {:<10}  {}",
                or_dash(record.ip.as_deref()),
                port,
                cvss,
                or_dash(vuln.and_then(|v| v.severity.as_deref())),
                vuln.map(|v| v.name.as_str()).unwrap_or(record.vuln_id.as_str())
            )?;
        }
        writeln!(w)?;
        writeln!(w, "{} finding(s)", self.findings.len())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use openvas_sync_core::types::{FindingRecord, ScanStatus};
    use openvas_sync_storage::MemoryStore;

    use super::*;

    fn report(id: &str) -> Report {
        Report {
            report_id: id.to_owned(),
            name: "Weekly internal scan".to_owned(),
            creation_time: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            modification_time: Utc.with_ymd_and_hms(2024, 5, 1, 11, 30, 0).unwrap(),
            owner_name: "admin".to_owned(),
            scan_start: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 5).unwrap(),
            scan_end: None,
            scan_status: ScanStatus::Done,
            severity: 7.5,
            result_count: 1,
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_report(&report("r-1")).await.unwrap();
        store
            .find_or_create_vulnerability(&Vulnerability {
                vuln_id: "oid-1".to_owned(),
                name: "OpenSSH Obsolete Version".to_owned(),
                category: Some("nvt".to_owned()),
                cvss_base: Some(7.5),
                severity: Some("High".to_owned()),
                solution_type: None,
                summary: None,
                cves: None,
                solution: None,
                affected_software: None,
                insight: None,
            })
            .await
            .unwrap();
        store
            .create_finding(&FindingRecord {
                report_id: "r-1".to_owned(),
                vuln_id: "oid-1".to_owned(),
                ip: Some("10.0.0.5".to_owned()),
                hostname: None,
                port: Some("22".to_owned()),
                protocol: Some("tcp".to_owned()),
                qod: None,
                specific_result: None,
                detection_method: None,
            })
            .await
            .unwrap();
        store
    }

    fn text<T: Render>(payload: &T) -> String {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        payload.render_text(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn show_joins_vulnerabilities() {
        let store = seeded().await;
        let detail = show(&store, "r-1").await.unwrap();
        assert_eq!(detail.findings.len(), 1);
        assert!(detail.vulnerabilities.contains_key("oid-1"));

        let out = text(&detail);
        assert!(out.contains("10.0.0.5"));
        assert!(out.contains("22/tcp"));
        assert!(out.contains("OpenSSH Obsolete Version"));
        assert!(out.contains("1 finding(s)"));
    }

    #[tokio::test]
    async fn show_unknown_report_is_command_error() {
        let store = seeded().await;
        let err = show(&store, "r-404").await.err().unwrap();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("r-404"));
    }

    #[tokio::test]
    async fn list_renders_table() {
        let store = seeded().await;
        let out = text(&list(&store).await.unwrap());
        assert!(out.contains("r-1"));
        assert!(out.contains("Weekly internal scan"));
        assert!(out.contains("1 report(s)"));
    }

    #[test]
    fn empty_list() {
        assert_eq!(text(&ReportList { reports: vec![] }).trim(), "No reports stored.");
    }

    #[test]
    fn truncate_long_names() {
        assert_eq!(truncate("abcdef", 5), "ab...");
        assert_eq!(truncate("abc", 5), "abc");
    }
}
