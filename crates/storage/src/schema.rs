//! Table definitions and per-dialect SQL rendering.
//!
//! Statements are written once with `?` placeholders and rewritten to `$n`
//! for PostgreSQL.

use std::borrow::Cow;

use crate::config::Dialect;

pub(crate) const REPORT_COLUMNS: &str = "report_id, name, creation_time, modification_time, owner_name, \
     scan_start, scan_end, scan_status, severity, result_count";

pub(crate) const VULNERABILITY_COLUMNS: &str = "vuln_id, name, category, cvss_base, severity, solution_type, \
     summary, cves, solution, affected_software, insight";

/// `vulnerabilities.vuln_id` column width in characters.
pub(crate) const VULN_ID_MAX_CHARS: usize = 255;

/// `vulnerabilities.name` column width in characters.
pub(crate) const VULN_NAME_MAX_CHARS: usize = 512;

pub(crate) const FINDING_COLUMNS: &str = "finding_id, report_id, vuln_id, ip, hostname, port, protocol, \
     qod, specific_result, detection_method";

impl Dialect {
    /// Rewrites `?` placeholders for the dialect.
    pub(crate) fn sql<'a>(&self, template: &'a str) -> Cow<'a, str> {
        if *self != Dialect::Postgres || !template.contains('?') {
            return Cow::Borrowed(template);
        }
        let mut out = String::with_capacity(template.len() + 16);
        let mut index = 0;
        for ch in template.chars() {
            if ch == '?' {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            } else {
                out.push(ch);
            }
        }
        Cow::Owned(out)
    }

    fn double_type(&self) -> &'static str {
        match self {
            Dialect::Postgres => "DOUBLE PRECISION",
            Dialect::MySql => "DOUBLE",
            Dialect::Sqlite => "REAL",
        }
    }

    /// `INSERT` that skips rows colliding on a unique key.
    ///
    /// MySQL uses a no-op `ON DUPLICATE KEY UPDATE` rather than `INSERT IGNORE`,
    /// which would also swallow truncation and other data errors.
    pub(crate) fn insert_if_absent(
        &self,
        table: &str,
        columns: &str,
        placeholders: &str,
        key_column: &str,
    ) -> String {
        match self {
            Dialect::MySql => format!(
                "INSERT INTO {table} ({columns}) VALUES ({placeholders}) \
                 ON DUPLICATE KEY UPDATE {key_column} = {key_column}"
            ),
            Dialect::Postgres | Dialect::Sqlite => format!(
                "INSERT INTO {table} ({columns}) VALUES ({placeholders}) ON CONFLICT DO NOTHING"
            ),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statements, in dependency order.
    pub(crate) fn schema(&self) -> Vec<String> {
        let double = self.double_type();
        let mut statements = vec![
            format!(
                "CREATE TABLE IF NOT EXISTS reports (
                    report_id VARCHAR(64) NOT NULL PRIMARY KEY,
                    name TEXT NOT NULL,
                    creation_time VARCHAR(40) NOT NULL,
                    modification_time VARCHAR(40) NOT NULL,
                    owner_name TEXT NOT NULL,
                    scan_start VARCHAR(40) NOT NULL,
                    scan_end VARCHAR(40),
                    scan_status VARCHAR(64) NOT NULL,
                    severity {double} NOT NULL,
                    result_count BIGINT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS vulnerabilities (
                    vuln_id VARCHAR({VULN_ID_MAX_CHARS}) NOT NULL PRIMARY KEY,
                    name VARCHAR({VULN_NAME_MAX_CHARS}) NOT NULL UNIQUE,
                    category VARCHAR(32),
                    cvss_base {double},
                    severity VARCHAR(32),
                    solution_type VARCHAR(64),
                    summary TEXT,
                    cves TEXT,
                    solution TEXT,
                    affected_software TEXT,
                    insight TEXT
                )"
            ),
            "CREATE TABLE IF NOT EXISTS report_vulnerabilities (
                finding_id VARCHAR(36) NOT NULL PRIMARY KEY,
                report_id VARCHAR(64) NOT NULL,
                vuln_id VARCHAR(255) NOT NULL,
                ip VARCHAR(64),
                hostname TEXT,
                port VARCHAR(32),
                protocol VARCHAR(16),
                qod VARCHAR(16),
                specific_result TEXT,
                detection_method TEXT,
                FOREIGN KEY (report_id) REFERENCES reports (report_id),
                FOREIGN KEY (vuln_id) REFERENCES vulnerabilities (vuln_id)
            )"
            .to_owned(),
        ];
        // MySQL indexes foreign key columns on its own and lacks CREATE INDEX IF NOT EXISTS.
        if *self != Dialect::MySql {
            statements.push(
                "CREATE INDEX IF NOT EXISTS idx_report_vulnerabilities_report \
                 ON report_vulnerabilities (report_id)"
                    .to_owned(),
            );
        }
        statements
    }
}
