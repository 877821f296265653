//! GMP command serialization and report id validation.

use quick_xml::escape::escape;

use crate::error::GmpClientError;

/// Maximum report id length accepted by [`validate_report_id`].
pub const MAX_REPORT_ID_LEN: usize = 64;

/// Validates a report id before it is placed into a command or a file name.
///
/// gvmd report ids are UUIDs; anything outside ASCII alphanumerics, `-` and
/// `_` is rejected so an id can never escape an attribute value or the data
/// directory.
pub fn validate_report_id(id: &str) -> Result<(), GmpClientError> {
    if id.is_empty() || id.len() > MAX_REPORT_ID_LEN {
        return Err(GmpClientError::InvalidReportId(format!(
            "length {} (must be 1-{MAX_REPORT_ID_LEN})",
            id.len()
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(GmpClientError::InvalidReportId(format!(
            "'{}' contains characters outside [A-Za-z0-9_-]",
            id.escape_default()
        )));
    }
    Ok(())
}

/// A GMP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GmpCommand<'a> {
    /// `<authenticate>` with username and password.
    Authenticate {
        username: &'a str,
        password: &'a str,
    },
    /// `<get_version/>`, accepted before authentication.
    GetVersion,
    /// `<get_reports/>` with a result filter.
    GetReports { filter: &'a str },
    /// `<get_report/>` for one report rendered in `format_id`.
    GetReport {
        report_id: &'a str,
        format_id: &'a str,
        details: bool,
    },
}

impl GmpCommand<'_> {
    /// Command name, used for logging and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::GetVersion => "get_version",
            Self::GetReports { .. } => "get_reports",
            Self::GetReport { .. } => "get_report",
        }
    }

    /// Serializes the command to its XML request document.
    pub fn to_xml(&self) -> String {
        match self {
            Self::Authenticate { username, password } => format!(
                "<authenticate><credentials><username>{}</username><password>{}</password></credentials></authenticate>",
                escape(*username),
                escape(*password)
            ),
            Self::GetVersion => "<get_version/>".to_owned(),
            Self::GetReports { filter } => {
                format!("<get_reports filter=\"{}\"/>", escape(*filter))
            }
            Self::GetReport {
                report_id,
                format_id,
                details,
            } => format!(
                "<get_report report_id=\"{}\" format_id=\"{}\" ignore_pagination=\"1\" details=\"{}\"/>",
                escape(*report_id),
                escape(*format_id),
                u8::from(*details)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uuid_report_ids() {
        validate_report_id("5d1e4b3a-8c2f-4e6a-9b7d-0123456789ab").unwrap();
        validate_report_id("report_01").unwrap();
    }

    #[test]
    fn rejects_bad_report_ids() {
        for id in ["", "../etc/passwd", "a\"b", "a b", "ä", &"x".repeat(65)] {
            let result = validate_report_id(id);
            assert!(
                matches!(result, Err(GmpClientError::InvalidReportId(_))),
                "id {id:?} should be rejected"
            );
        }
    }

    #[test]
    fn authenticate_escapes_credentials() {
        let xml = GmpCommand::Authenticate {
            username: "admin",
            password: "p<&>w",
        }
        .to_xml();
        assert_eq!(
            xml,
            "<authenticate><credentials><username>admin</username><password>p&lt;&amp;&gt;w</password></credentials></authenticate>"
        );
    }

    #[test]
    fn get_report_disables_pagination() {
        let cmd = GmpCommand::GetReport {
            report_id: "r1",
            format_id: "c1645568-627a-11e3-a660-406186ea4fc5",
            details: true,
        };
        assert_eq!(cmd.name(), "get_report");
        assert_eq!(
            cmd.to_xml(),
            "<get_report report_id=\"r1\" format_id=\"c1645568-627a-11e3-a660-406186ea4fc5\" ignore_pagination=\"1\" details=\"1\"/>"
        );
    }

    #[test]
    fn get_reports_carries_filter() {
        let cmd = GmpCommand::GetReports { filter: "rows=-1" };
        assert_eq!(cmd.to_xml(), "<get_reports filter=\"rows=-1\"/>");
    }
}
