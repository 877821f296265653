//! Positional CSV row parsing.
//!
//! The CSV Results export has a fixed column order. Row 0 is the header and
//! is discarded; data rows are numbered from 1. Columns past
//! [`REQUIRED_COLUMNS`] are optional and read as absent when a row stops
//! early.

use csv::{ByteRecord, ReaderBuilder, Trim};
use openvas_sync_core::types::{FindingRecord, Vulnerability};

use crate::error::RowParseError;

/// Column positions of the CSV Results export.
pub mod columns {
    pub const IP: usize = 0;
    pub const HOSTNAME: usize = 1;
    pub const PORT: usize = 2;
    pub const PROTOCOL: usize = 3;
    pub const CVSS: usize = 4;
    pub const SEVERITY: usize = 5;
    pub const QOD: usize = 6;
    pub const SOLUTION_TYPE: usize = 7;
    pub const NAME: usize = 8;
    pub const SUMMARY: usize = 9;
    pub const SPECIFIC_RESULT: usize = 10;
    pub const TEST_ID: usize = 11;
    pub const CVES: usize = 12;
    pub const SOLUTION: usize = 18;
    pub const AFFECTED_SOFTWARE: usize = 19;
    pub const INSIGHT: usize = 20;
    pub const DETECTION_METHOD: usize = 21;
}

/// Full width of the export.
pub const EXPORT_COLUMNS: usize = 22;

/// A row must reach the test identifier column to be usable.
pub const REQUIRED_COLUMNS: usize = columns::TEST_ID + 1;

/// OID arc under which Greenbone publishes its NVTs.
const NVT_OID_PREFIX: &str = "1.3.6.1.4.1.25623.";

/// One data row split into its two records.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    /// Row number, header = 0.
    pub row_index: usize,
    /// Vulnerability definition carried by the row.
    pub vulnerability: Vulnerability,
    /// Finding; `vuln_id` holds the row's test id until the store resolves it.
    pub finding: FindingRecord,
}

/// Parses every data row of a decoded CSV payload.
///
/// Each item is either a parsed row or the error for that row, so one bad
/// row never hides the rest.
pub fn parse_rows<'a>(
    report_id: &'a str,
    csv: &'a [u8],
) -> impl Iterator<Item = Result<ParsedRow, RowParseError>> + 'a {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(csv);

    reader
        .into_byte_records()
        .enumerate()
        .map(move |(i, record)| {
            let row_index = i + 1;
            let record = record.map_err(|e| RowParseError {
                row_index,
                column_index: 0,
                reason: e.to_string(),
            })?;
            parse_record(report_id, row_index, &record)
        })
}

/// Parses one data row.
pub fn parse_record(
    report_id: &str,
    row_index: usize,
    record: &ByteRecord,
) -> Result<ParsedRow, RowParseError> {
    if record.len() < REQUIRED_COLUMNS {
        return Err(RowParseError {
            row_index,
            column_index: record.len(),
            reason: format!(
                "expected at least {REQUIRED_COLUMNS} columns, found {}",
                record.len()
            ),
        });
    }

    let field = |column: usize| -> Option<String> {
        record
            .get(column)
            .map(|raw| String::from_utf8_lossy(raw).trim().to_owned())
            .filter(|value| !value.is_empty())
    };
    let required = |column: usize, what: &str| -> Result<String, RowParseError> {
        field(column).ok_or_else(|| RowParseError {
            row_index,
            column_index: column,
            reason: format!("{what} is empty"),
        })
    };

    let name = required(columns::NAME, "vulnerability name")?;
    let test_id = required(columns::TEST_ID, "test identifier")?;
    let cvss_base = field(columns::CVSS)
        .map(|raw| {
            raw.parse::<f64>()
                .ok()
                .filter(|score| score.is_finite())
                .ok_or_else(|| RowParseError {
                    row_index,
                    column_index: columns::CVSS,
                    reason: format!("invalid base score '{raw}'"),
                })
        })
        .transpose()?;

    let vulnerability = Vulnerability {
        vuln_id: test_id.clone(),
        name,
        category: category_for(&test_id).map(str::to_owned),
        cvss_base,
        severity: field(columns::SEVERITY),
        solution_type: field(columns::SOLUTION_TYPE),
        summary: field(columns::SUMMARY),
        cves: field(columns::CVES),
        solution: field(columns::SOLUTION),
        affected_software: field(columns::AFFECTED_SOFTWARE),
        insight: field(columns::INSIGHT),
    };
    let finding = FindingRecord {
        report_id: report_id.to_owned(),
        vuln_id: test_id,
        ip: field(columns::IP),
        hostname: field(columns::HOSTNAME),
        port: field(columns::PORT),
        protocol: field(columns::PROTOCOL),
        qod: field(columns::QOD),
        specific_result: field(columns::SPECIFIC_RESULT),
        detection_method: field(columns::DETECTION_METHOD),
    };

    Ok(ParsedRow {
        row_index,
        vulnerability,
        finding,
    })
}

/// Vulnerability category implied by a test identifier.
pub fn category_for(test_id: &str) -> Option<&'static str> {
    if test_id.starts_with(NVT_OID_PREFIX) {
        Some("nvt")
    } else if test_id.starts_with("CVE-") {
        Some("cve")
    } else {
        None
    }
}
