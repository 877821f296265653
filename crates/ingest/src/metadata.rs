//! Report metadata extraction.
//!
//! gvmd nests a report twice: the outer `<report>` carries the envelope
//! attributes (`id`, `format_id`, task, owner) and, for XML based formats, an
//! inner `<report>` carries the scan details. Fields are looked up on the outer
//! element, then on the inner one. Only direct children count: per-result
//! elements such as `<results><result><severity>` never stand in for a
//! report-level field.

use chrono::{DateTime, NaiveDateTime, Utc};
use openvas_sync_core::types::{Report, ScanStatus};
use openvas_sync_gmp::{Element, Envelope};

use crate::error::IngestError;

struct Scope<'a> {
    outer: &'a Element,
    inner: Option<&'a Element>,
}

impl<'a> Scope<'a> {
    fn new(envelope: &'a Envelope) -> Result<Self, IngestError> {
        let outer = envelope
            .find("report")
            .ok_or_else(|| IngestError::metadata("report", "envelope has no <report> element"))?;
        Ok(Self {
            outer,
            inner: outer.child("report"),
        })
    }

    fn lookup(&self, name: &str) -> Option<&'a Element> {
        self.outer
            .child(name)
            .or_else(|| self.inner.and_then(|inner| inner.child(name)))
    }

    fn text(&self, field: &str) -> Option<&'a str> {
        self.lookup(field).map(Element::text).filter(|t| !t.is_empty())
    }

    fn required(&self, field: &str) -> Result<&'a str, IngestError> {
        self.text(field)
            .ok_or_else(|| IngestError::metadata(field, "missing or empty"))
    }

    /// `<severity><full/><filtered/></severity>` style values.
    fn filtered(&self, field: &str) -> Result<&'a str, IngestError> {
        let element = self
            .lookup(field)
            .ok_or_else(|| IngestError::metadata(field, "missing"))?;
        let value = match element.child("filtered") {
            Some(filtered) => filtered.text(),
            None => element.text(),
        };
        if value.is_empty() {
            return Err(IngestError::metadata(field, "no filtered value"));
        }
        Ok(value)
    }

    fn task_name(&self) -> Result<String, IngestError> {
        let from_task = self
            .lookup("task")
            .and_then(|task| task.child("name"))
            .map(Element::text)
            .filter(|name| !name.is_empty());
        from_task
            .or_else(|| {
                self.outer
                    .child("name")
                    .map(Element::text)
                    .filter(|name| !name.is_empty())
            })
            .map(str::to_owned)
            .ok_or_else(|| IngestError::metadata("name", "no task name or report name"))
    }
}

/// Parses a gvmd timestamp (`2024-05-01T10:00:00Z` or with an explicit offset).
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, IngestError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| IngestError::metadata(field, format!("invalid timestamp '{value}': {e}")))
}

/// Extracts the [`Report`] record for `report_id` from a report envelope.
///
/// # Errors
///
/// [`IngestError::MalformedMetadata`] naming the first missing or unparsable
/// field, a report id that differs from the requested one, or timestamps out
/// of order (reported on the later field).
pub fn extract_metadata(report_id: &str, envelope: &Envelope) -> Result<Report, IngestError> {
    let scope = Scope::new(envelope)?;

    if let Some(id) = scope.outer.attr("id") {
        if id != report_id {
            return Err(IngestError::metadata(
                "report_id",
                format!("envelope carries report '{id}', expected '{report_id}'"),
            ));
        }
    }

    let name = scope.task_name()?;
    let creation_time = parse_timestamp("creation_time", scope.required("creation_time")?)?;
    let modification_time =
        parse_timestamp("modification_time", scope.required("modification_time")?)?;
    let owner_name = scope
        .lookup("owner")
        .and_then(|owner| owner.child("name"))
        .map(Element::text)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| IngestError::metadata("owner", "missing owner name"))?
        .to_owned();
    let scan_start = parse_timestamp("scan_start", scope.required("scan_start")?)?;
    let scan_end = scope
        .text("scan_end")
        .map(|value| parse_timestamp("scan_end", value))
        .transpose()?;
    let scan_status = ScanStatus::from_wire(scope.required("scan_run_status")?);

    let severity_text = scope.filtered("severity")?;
    let severity: f64 = severity_text
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| {
            IngestError::metadata("severity", format!("not a decimal: '{severity_text}'"))
        })?;
    let count_text = scope.filtered("result_count")?;
    let result_count: i64 = count_text.parse().map_err(|_| {
        IngestError::metadata("result_count", format!("not an integer: '{count_text}'"))
    })?;

    if creation_time > modification_time {
        return Err(IngestError::metadata(
            "modification_time",
            "earlier than creation_time",
        ));
    }
    if let Some(end) = scan_end {
        if scan_start > end {
            return Err(IngestError::metadata("scan_end", "earlier than scan_start"));
        }
    }

    Ok(Report {
        report_id: report_id.to_owned(),
        name,
        creation_time,
        modification_time,
        owner_name,
        scan_start,
        scan_end,
        scan_status,
        severity,
        result_count,
    })
}
