//! Scripted report source and envelope builders shared by the pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use openvas_sync_gmp::{Envelope, GmpClientError, ReportSource};
use tokio_util::sync::CancellationToken;

pub const CSV_HEADER: &str = "IP,Hostname,Port,Port Protocol,CVSS,Severity,QoD,Solution Type,\
NVT Name,Summary,Specific Result,NVT OID,CVEs,Task ID,Task Name,Timestamp,Result ID,Impact,\
Solution,Affected Software/OS,Vulnerability Insight,Vulnerability Detection Method";

/// What the scripted source answers for one report.
#[derive(Clone)]
pub enum Script {
    Envelope(String),
    Error(fn() -> GmpClientError),
}

#[derive(Default)]
pub struct ScriptedSource {
    pub ids: Vec<String>,
    pub reports: HashMap<(String, String), Script>,
    pub list_error: bool,
    pub fetched: Vec<String>,
    /// Cancelled while the named report is being fetched.
    pub cancel_on: Option<(String, CancellationToken)>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(mut self, id: &str, format_id: &str, xml: String) -> Self {
        if !self.ids.iter().any(|known| known == id) {
            self.ids.push(id.to_owned());
        }
        self.reports
            .insert((id.to_owned(), format_id.to_owned()), Script::Envelope(xml));
        self
    }

    pub fn failing(mut self, id: &str, format_id: &str, err: fn() -> GmpClientError) -> Self {
        if !self.ids.iter().any(|known| known == id) {
            self.ids.push(id.to_owned());
        }
        self.reports
            .insert((id.to_owned(), format_id.to_owned()), Script::Error(err));
        self
    }
}

impl ReportSource for ScriptedSource {
    async fn list_report_ids(&mut self) -> Result<Vec<String>, GmpClientError> {
        if self.list_error {
            return Err(GmpClientError::Connection("socket closed".to_owned()));
        }
        Ok(self.ids.clone())
    }

    async fn fetch_report_envelope(
        &mut self,
        report_id: &str,
        format_id: &str,
    ) -> Result<Envelope, GmpClientError> {
        self.fetched.push(report_id.to_owned());
        if let Some((id, token)) = &self.cancel_on {
            if id == report_id {
                token.cancel();
            }
        }
        match self.reports.get(&(report_id.to_owned(), format_id.to_owned())) {
            Some(Script::Envelope(xml)) => {
                Envelope::parse(xml).map_err(|e| GmpClientError::InvalidResponse(e.to_string()))
            }
            Some(Script::Error(make)) => Err(make()),
            None => Err(GmpClientError::CommandFailed {
                command: "get_report".to_owned(),
                status: "404".to_owned(),
                status_text: format!("Failed to find report '{report_id}'"),
            }),
        }
    }
}

/// Metadata elements of a finished scan.
pub fn metadata_xml(task: &str) -> String {
    format!(
        "<owner><name>admin</name></owner>\
<creation_time>2024-05-01T10:00:00Z</creation_time>\
<modification_time>2024-05-01T11:30:00Z</modification_time>\
<task id=\"t-1\"><name>{task}</name></task>\
<scan_run_status>Done</scan_run_status>\
<scan_start>2024-05-01T10:00:05Z</scan_start>\
<scan_end>2024-05-01T11:29:00Z</scan_end>\
<result_count><full>2</full><filtered>2</filtered></result_count>\
<severity><full>7.5</full><filtered>7.5</filtered></severity>"
    )
}

/// CSV format envelope carrying `rows` under the standard header.
pub fn csv_envelope(report_id: &str, rows: &[&str]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    envelope_with_payload(report_id, &metadata_xml("Weekly internal scan"), &STANDARD.encode(csv))
}

pub fn envelope_with_payload(report_id: &str, metadata: &str, payload: &str) -> String {
    format!(
        "<get_report_response status=\"200\" status_text=\"OK\">\
<report id=\"{report_id}\" format_id=\"c1645568-627a-11e3-a660-406186ea4fc5\" extension=\"csv\">\
{metadata}<report_format id=\"c1645568-627a-11e3-a660-406186ea4fc5\"><name>CSV Results</name>\
</report_format>{payload}</report></get_report_response>"
    )
}

pub fn row(ip: &str, name: &str, test_id: &str, summary: &str) -> String {
    format!("{ip},host,22,tcp,7.5,High,95%,VendorFix,{name},{summary},Result,{test_id},,,,,,,Fix it,Linux,Insight,Remote")
}
