//! SQL 저장소
//!
//! [`SqlStore`]는 `sqlx`의 Any 드라이버 위에서 PostgreSQL, MySQL, SQLite를
//! 같은 코드로 다룹니다. 모든 변경 연산은 하나의 트랜잭션으로 실행되며,
//! 실패 시 트랜잭션이 드롭되면서 롤백됩니다.
//!
//! 타임스탬프는 RFC 3339 문자열로 저장합니다 (Any 드라이버에 날짜 타입이 없음).

use chrono::{DateTime, SecondsFormat, Utc};
use openvas_sync_core::types::{Finding, FindingRecord, Report, ScanStatus, Vulnerability};
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, AnyPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{Dialect, StoreConfig};
use crate::error::StoreError;
use crate::repository::{FindingRepository, ReportRepository, VulnerabilityRepository};
use crate::schema::{
    FINDING_COLUMNS, REPORT_COLUMNS, VULN_ID_MAX_CHARS, VULN_NAME_MAX_CHARS,
    VULNERABILITY_COLUMNS,
};

type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// SQL 저장소
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlStore {
    /// 데이터베이스에 연결하고, 설정에 따라 테이블을 생성합니다.
    ///
    /// # Errors
    ///
    /// - `StoreError::Config`: 설정값 오류
    /// - `StoreError::Connection`: 연결 실패 또는 타임아웃
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.connection_url())
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {e}", config.redacted_url())))?;

        let store = Self {
            pool,
            dialect: config.dialect,
        };
        if config.create_schema {
            store.ensure_schema().await?;
        }
        info!(
            engine = %config.dialect,
            url = %config.redacted_url(),
            "database connected"
        );
        Ok(store)
    }

    /// 사용 중인 SQL 방언
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// 테이블이 없으면 생성합니다.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in self.dialect.schema() {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        debug!(engine = %self.dialect, "schema ensured");
        Ok(())
    }

    /// 연결 상태를 확인합니다.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }

    /// 커넥션 풀을 닫습니다.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn exists(
        &self,
        conn: &mut AnyConnection,
        template: &str,
        key: &str,
    ) -> Result<bool, StoreError> {
        let sql = self.dialect.sql(template);
        let row = sqlx::query(&sql).bind(key).fetch_optional(conn).await?;
        Ok(row.is_some())
    }

    async fn fetch_vulnerability(
        &self,
        conn: &mut AnyConnection,
        column: &str,
        key: &str,
    ) -> Result<Option<Vulnerability>, StoreError> {
        let template =
            format!("SELECT {VULNERABILITY_COLUMNS} FROM vulnerabilities WHERE {column} = ?");
        let sql = self.dialect.sql(&template);
        let row = sqlx::query(&sql).bind(key).fetch_optional(conn).await?;
        row.as_ref().map(vulnerability_from_row).transpose()
    }

    async fn check_finding_references(
        &self,
        conn: &mut AnyConnection,
        record: &FindingRecord,
    ) -> Result<(), StoreError> {
        if !self
            .exists(
                conn,
                "SELECT 1 FROM reports WHERE report_id = ?",
                &record.report_id,
            )
            .await?
        {
            return Err(StoreError::ForeignKey {
                entity: "finding",
                key: record.report_id.clone(),
                reason: "report does not exist".to_owned(),
            });
        }
        if !self
            .exists(
                conn,
                "SELECT 1 FROM vulnerabilities WHERE vuln_id = ?",
                &record.vuln_id,
            )
            .await?
        {
            return Err(StoreError::ForeignKey {
                entity: "finding",
                key: record.vuln_id.clone(),
                reason: "vulnerability does not exist".to_owned(),
            });
        }
        Ok(())
    }
}

impl ReportRepository for SqlStore {
    async fn create_report(&self, report: &Report) -> Result<Report, StoreError> {
        let mut tx = self.pool.begin().await?;
        if self
            .exists(
                &mut tx,
                "SELECT 1 FROM reports WHERE report_id = ?",
                &report.report_id,
            )
            .await?
        {
            return Err(StoreError::DuplicateKey {
                entity: "report",
                key: report.report_id.clone(),
            });
        }

        let template = format!(
            "INSERT INTO reports ({REPORT_COLUMNS}) VALUES ({})",
            placeholders(10)
        );
        let sql = self.dialect.sql(&template);
        bind_report(sqlx::query(&sql), report)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "report", &report.report_id))?;
        tx.commit().await?;

        debug!(report_id = %report.report_id, "report created");
        Ok(report.clone())
    }

    async fn get_report(&self, report_id: &str) -> Result<Option<Report>, StoreError> {
        let template = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE report_id = ?");
        let sql = self.dialect.sql(&template);
        let row = sqlx::query(&sql)
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(report_from_row).transpose()
    }

    async fn list_reports(&self) -> Result<Vec<Report>, StoreError> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports ORDER BY report_id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(report_from_row).collect()
    }

    async fn update_report(&self, report: &Report) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        if !self
            .exists(
                &mut tx,
                "SELECT 1 FROM reports WHERE report_id = ?",
                &report.report_id,
            )
            .await?
        {
            return Err(StoreError::NotFound {
                entity: "report",
                key: report.report_id.clone(),
            });
        }

        let sql = self.dialect.sql(
            "UPDATE reports SET name = ?, creation_time = ?, modification_time = ?, \
             owner_name = ?, scan_start = ?, scan_end = ?, scan_status = ?, severity = ?, \
             result_count = ? WHERE report_id = ?",
        );
        sqlx::query(&sql)
            .bind(report.name.clone())
            .bind(format_time(&report.creation_time))
            .bind(format_time(&report.modification_time))
            .bind(report.owner_name.clone())
            .bind(format_time(&report.scan_start))
            .bind(report.scan_end.as_ref().map(format_time))
            .bind(report.scan_status.as_str().to_owned())
            .bind(report.severity)
            .bind(report.result_count)
            .bind(report.report_id.clone())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_report(&self, report_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        if !self
            .exists(
                &mut tx,
                "SELECT 1 FROM reports WHERE report_id = ?",
                report_id,
            )
            .await?
        {
            return Err(StoreError::NotFound {
                entity: "report",
                key: report_id.to_owned(),
            });
        }

        let findings = self
            .dialect
            .sql("DELETE FROM report_vulnerabilities WHERE report_id = ?");
        let removed = sqlx::query(&findings)
            .bind(report_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let reports = self.dialect.sql("DELETE FROM reports WHERE report_id = ?");
        sqlx::query(&reports)
            .bind(report_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(report_id, findings = removed, "report deleted");
        Ok(())
    }
}

impl VulnerabilityRepository for SqlStore {
    async fn find_or_create_vulnerability(
        &self,
        vuln: &Vulnerability,
    ) -> Result<Vulnerability, StoreError> {
        check_vulnerability_key(vuln)?;
        let mut tx = self.pool.begin().await?;

        let template = self.dialect.insert_if_absent(
            "vulnerabilities",
            VULNERABILITY_COLUMNS,
            &placeholders(11),
            "vuln_id",
        );
        let sql = self.dialect.sql(&template);
        let inserted = bind_vulnerability(sqlx::query(&sql), vuln)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "vulnerability", &vuln.name))?
            .rows_affected();

        let stored = match self.fetch_vulnerability(&mut tx, "name", &vuln.name).await? {
            Some(existing) => existing,
            None => self
                .fetch_vulnerability(&mut tx, "vuln_id", &vuln.vuln_id)
                .await?
                .ok_or_else(|| {
                    StoreError::Query(format!(
                        "vulnerability '{}' missing after insert-if-absent",
                        vuln.vuln_id
                    ))
                })?,
        };
        tx.commit().await?;

        if inserted > 0 {
            debug!(vuln_id = %stored.vuln_id, name = %stored.name, "vulnerability created");
        }
        Ok(stored)
    }

    async fn get_vulnerability(&self, vuln_id: &str) -> Result<Option<Vulnerability>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        self.fetch_vulnerability(&mut conn, "vuln_id", vuln_id).await
    }

    async fn find_vulnerability_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Vulnerability>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        self.fetch_vulnerability(&mut conn, "name", name).await
    }

    async fn list_vulnerabilities(&self) -> Result<Vec<Vulnerability>, StoreError> {
        let sql = format!("SELECT {VULNERABILITY_COLUMNS} FROM vulnerabilities ORDER BY name");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(vulnerability_from_row).collect()
    }

    async fn update_vulnerability(&self, vuln: &Vulnerability) -> Result<(), StoreError> {
        check_vulnerability_key(vuln)?;
        let mut tx = self.pool.begin().await?;
        if !self
            .exists(
                &mut tx,
                "SELECT 1 FROM vulnerabilities WHERE vuln_id = ?",
                &vuln.vuln_id,
            )
            .await?
        {
            return Err(StoreError::NotFound {
                entity: "vulnerability",
                key: vuln.vuln_id.clone(),
            });
        }
        if let Some(other) = self.fetch_vulnerability(&mut tx, "name", &vuln.name).await? {
            if other.vuln_id != vuln.vuln_id {
                return Err(StoreError::DuplicateKey {
                    entity: "vulnerability",
                    key: vuln.name.clone(),
                });
            }
        }

        let sql = self.dialect.sql(
            "UPDATE vulnerabilities SET name = ?, category = ?, cvss_base = ?, severity = ?, \
             solution_type = ?, summary = ?, cves = ?, solution = ?, affected_software = ?, \
             insight = ? WHERE vuln_id = ?",
        );
        sqlx::query(&sql)
            .bind(vuln.name.clone())
            .bind(vuln.category.clone())
            .bind(vuln.cvss_base)
            .bind(vuln.severity.clone())
            .bind(vuln.solution_type.clone())
            .bind(vuln.summary.clone())
            .bind(vuln.cves.clone())
            .bind(vuln.solution.clone())
            .bind(vuln.affected_software.clone())
            .bind(vuln.insight.clone())
            .bind(vuln.vuln_id.clone())
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "vulnerability", &vuln.name))?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_vulnerability(&self, vuln_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        if !self
            .exists(
                &mut tx,
                "SELECT 1 FROM vulnerabilities WHERE vuln_id = ?",
                vuln_id,
            )
            .await?
        {
            return Err(StoreError::NotFound {
                entity: "vulnerability",
                key: vuln_id.to_owned(),
            });
        }

        let count_sql = self
            .dialect
            .sql("SELECT COUNT(*) AS refs FROM report_vulnerabilities WHERE vuln_id = ?");
        let references: i64 = sqlx::query(&count_sql)
            .bind(vuln_id)
            .fetch_one(&mut *tx)
            .await?
            .try_get("refs")?;
        if references > 0 {
            return Err(StoreError::ForeignKey {
                entity: "vulnerability",
                key: vuln_id.to_owned(),
                reason: format!("referenced by {references} finding(s)"),
            });
        }

        let sql = self.dialect.sql("DELETE FROM vulnerabilities WHERE vuln_id = ?");
        sqlx::query(&sql).bind(vuln_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

impl FindingRepository for SqlStore {
    async fn create_finding(&self, record: &FindingRecord) -> Result<Finding, StoreError> {
        let mut tx = self.pool.begin().await?;
        self.check_finding_references(&mut tx, record).await?;

        let finding = Finding {
            finding_id: Uuid::new_v4().to_string(),
            record: record.clone(),
        };
        let template = format!(
            "INSERT INTO report_vulnerabilities ({FINDING_COLUMNS}) VALUES ({})",
            placeholders(10)
        );
        let sql = self.dialect.sql(&template);
        bind_finding(sqlx::query(&sql), &finding)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "finding", &finding.finding_id))?;
        tx.commit().await?;
        Ok(finding)
    }

    async fn get_finding(&self, finding_id: &str) -> Result<Option<Finding>, StoreError> {
        let template =
            format!("SELECT {FINDING_COLUMNS} FROM report_vulnerabilities WHERE finding_id = ?");
        let sql = self.dialect.sql(&template);
        let row = sqlx::query(&sql)
            .bind(finding_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(finding_from_row).transpose()
    }

    async fn list_findings(&self) -> Result<Vec<Finding>, StoreError> {
        let sql = format!("SELECT {FINDING_COLUMNS} FROM report_vulnerabilities");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(finding_from_row).collect()
    }

    async fn list_findings_for_report(&self, report_id: &str) -> Result<Vec<Finding>, StoreError> {
        let template =
            format!("SELECT {FINDING_COLUMNS} FROM report_vulnerabilities WHERE report_id = ?");
        let sql = self.dialect.sql(&template);
        let rows = sqlx::query(&sql)
            .bind(report_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(finding_from_row).collect()
    }

    async fn update_finding(&self, finding: &Finding) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        if !self
            .exists(
                &mut tx,
                "SELECT 1 FROM report_vulnerabilities WHERE finding_id = ?",
                &finding.finding_id,
            )
            .await?
        {
            return Err(StoreError::NotFound {
                entity: "finding",
                key: finding.finding_id.clone(),
            });
        }
        self.check_finding_references(&mut tx, &finding.record)
            .await?;

        let record = &finding.record;
        let sql = self.dialect.sql(
            "UPDATE report_vulnerabilities SET report_id = ?, vuln_id = ?, ip = ?, hostname = ?, \
             port = ?, protocol = ?, qod = ?, specific_result = ?, detection_method = ? \
             WHERE finding_id = ?",
        );
        sqlx::query(&sql)
            .bind(record.report_id.clone())
            .bind(record.vuln_id.clone())
            .bind(record.ip.clone())
            .bind(record.hostname.clone())
            .bind(record.port.clone())
            .bind(record.protocol.clone())
            .bind(record.qod.clone())
            .bind(record.specific_result.clone())
            .bind(record.detection_method.clone())
            .bind(finding.finding_id.clone())
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "finding", &finding.finding_id))?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_finding(&self, finding_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        if !self
            .exists(
                &mut tx,
                "SELECT 1 FROM report_vulnerabilities WHERE finding_id = ?",
                finding_id,
            )
            .await?
        {
            return Err(StoreError::NotFound {
                entity: "finding",
                key: finding_id.to_owned(),
            });
        }
        let sql = self
            .dialect
            .sql("DELETE FROM report_vulnerabilities WHERE finding_id = ?");
        sqlx::query(&sql).bind(finding_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

// --- 바인딩 / 디코딩 헬퍼 ---

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_time(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("column {column}: invalid timestamp '{raw}': {e}")))
}

/// 키 컬럼 폭을 넘는 값은 엔진마다 잘리거나 실패하므로 쓰기 전에 거부합니다.
fn check_vulnerability_key(vuln: &Vulnerability) -> Result<(), StoreError> {
    for (column, value, max) in [
        ("vuln_id", &vuln.vuln_id, VULN_ID_MAX_CHARS),
        ("name", &vuln.name, VULN_NAME_MAX_CHARS),
    ] {
        let len = value.chars().count();
        if len > max {
            return Err(StoreError::Query(format!(
                "vulnerability {column} is {len} characters, column holds {max}"
            )));
        }
    }
    Ok(())
}

/// 문자열 컬럼을 읽습니다.
///
/// MySQL은 `TEXT` 컬럼을 BLOB 타입으로 보내므로, 문자열 디코딩이 타입 불일치로
/// 실패하면 바이트로 읽어 UTF-8로 변환합니다.
fn opt_text(row: &AnyRow, column: &str) -> Result<Option<String>, StoreError> {
    match row.try_get::<Option<String>, _>(column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnDecode { .. }) => {
            let bytes: Option<Vec<u8>> = row.try_get(column)?;
            bytes
                .map(|b| {
                    String::from_utf8(b).map_err(|e| {
                        StoreError::Query(format!("column {column}: invalid UTF-8: {e}"))
                    })
                })
                .transpose()
        }
        Err(e) => Err(e.into()),
    }
}

fn text(row: &AnyRow, column: &str) -> Result<String, StoreError> {
    opt_text(row, column)?
        .ok_or_else(|| StoreError::Query(format!("column {column}: unexpected NULL")))
}

/// 쓰기 중 발생한 제약 조건 위반을 도메인 에러로 변환합니다.
fn write_error(err: sqlx::Error, entity: &'static str, key: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::DuplicateKey {
                entity,
                key: key.to_owned(),
            };
        }
        if db.is_foreign_key_violation() {
            return StoreError::ForeignKey {
                entity,
                key: key.to_owned(),
                reason: db.message().to_owned(),
            };
        }
    }
    err.into()
}

fn bind_report<'q>(query: AnyQuery<'q>, report: &Report) -> AnyQuery<'q> {
    query
        .bind(report.report_id.clone())
        .bind(report.name.clone())
        .bind(format_time(&report.creation_time))
        .bind(format_time(&report.modification_time))
        .bind(report.owner_name.clone())
        .bind(format_time(&report.scan_start))
        .bind(report.scan_end.as_ref().map(format_time))
        .bind(report.scan_status.as_str().to_owned())
        .bind(report.severity)
        .bind(report.result_count)
}

fn bind_vulnerability<'q>(query: AnyQuery<'q>, vuln: &Vulnerability) -> AnyQuery<'q> {
    query
        .bind(vuln.vuln_id.clone())
        .bind(vuln.name.clone())
        .bind(vuln.category.clone())
        .bind(vuln.cvss_base)
        .bind(vuln.severity.clone())
        .bind(vuln.solution_type.clone())
        .bind(vuln.summary.clone())
        .bind(vuln.cves.clone())
        .bind(vuln.solution.clone())
        .bind(vuln.affected_software.clone())
        .bind(vuln.insight.clone())
}

fn bind_finding<'q>(query: AnyQuery<'q>, finding: &Finding) -> AnyQuery<'q> {
    let record = &finding.record;
    query
        .bind(finding.finding_id.clone())
        .bind(record.report_id.clone())
        .bind(record.vuln_id.clone())
        .bind(record.ip.clone())
        .bind(record.hostname.clone())
        .bind(record.port.clone())
        .bind(record.protocol.clone())
        .bind(record.qod.clone())
        .bind(record.specific_result.clone())
        .bind(record.detection_method.clone())
}

fn report_from_row(row: &AnyRow) -> Result<Report, StoreError> {
    let end = opt_text(row, "scan_end")?;
    Ok(Report {
        report_id: text(row, "report_id")?,
        name: text(row, "name")?,
        creation_time: parse_time(&text(row, "creation_time")?, "creation_time")?,
        modification_time: parse_time(&text(row, "modification_time")?, "modification_time")?,
        owner_name: text(row, "owner_name")?,
        scan_start: parse_time(&text(row, "scan_start")?, "scan_start")?,
        scan_end: end.as_deref().map(|e| parse_time(e, "scan_end")).transpose()?,
        scan_status: ScanStatus::from_wire(&text(row, "scan_status")?),
        severity: row.try_get("severity")?,
        result_count: row.try_get("result_count")?,
    })
}

fn vulnerability_from_row(row: &AnyRow) -> Result<Vulnerability, StoreError> {
    Ok(Vulnerability {
        vuln_id: text(row, "vuln_id")?,
        name: text(row, "name")?,
        category: opt_text(row, "category")?,
        cvss_base: row.try_get("cvss_base")?,
        severity: opt_text(row, "severity")?,
        solution_type: opt_text(row, "solution_type")?,
        summary: opt_text(row, "summary")?,
        cves: opt_text(row, "cves")?,
        solution: opt_text(row, "solution")?,
        affected_software: opt_text(row, "affected_software")?,
        insight: opt_text(row, "insight")?,
    })
}

fn finding_from_row(row: &AnyRow) -> Result<Finding, StoreError> {
    Ok(Finding {
        finding_id: text(row, "finding_id")?,
        record: FindingRecord {
            report_id: text(row, "report_id")?,
            vuln_id: text(row, "vuln_id")?,
            ip: opt_text(row, "ip")?,
            hostname: opt_text(row, "hostname")?,
            port: opt_text(row, "port")?,
            protocol: opt_text(row, "protocol")?,
            qod: opt_text(row, "qod")?,
            specific_result: opt_text(row, "specific_result")?,
            detection_method: opt_text(row, "detection_method")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn timestamps_roundtrip_as_rfc3339() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let text = format_time(&t);
        assert_eq!(text, "2024-05-01T10:00:00Z");
        assert_eq!(parse_time(&text, "scan_start").unwrap(), t);
    }

    fn vuln(id: &str, name: &str) -> Vulnerability {
        Vulnerability {
            vuln_id: id.to_owned(),
            name: name.to_owned(),
            category: None,
            cvss_base: None,
            severity: None,
            solution_type: None,
            summary: None,
            cves: None,
            solution: None,
            affected_software: None,
            insight: None,
        }
    }

    #[test]
    fn oversized_vulnerability_keys_are_rejected() {
        check_vulnerability_key(&vuln("oid-1", &"n".repeat(VULN_NAME_MAX_CHARS))).unwrap();
        // Width is counted in characters, not bytes.
        check_vulnerability_key(&vuln("oid-1", &"é".repeat(VULN_NAME_MAX_CHARS))).unwrap();

        let err = check_vulnerability_key(&vuln("oid-1", &"n".repeat(VULN_NAME_MAX_CHARS + 1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Query(ref msg) if msg.contains("name is 513")));

        let err = check_vulnerability_key(&vuln(&"1".repeat(VULN_ID_MAX_CHARS + 1), "n"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Query(ref msg) if msg.contains("vuln_id")));
    }

    async fn memory_pool() -> AnyPool {
        sqlx::any::install_default_drivers();
        AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    // BLOB values reach the Any driver with the same type kind MySQL reports for TEXT.
    #[tokio::test]
    async fn text_columns_decode_from_blob_values() {
        let pool = memory_pool().await;
        let row = sqlx::query(
            "SELECT X'4f70656e53534820c3bc' AS name, CAST(NULL AS BLOB) AS summary, 'plain' AS cves",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(text(&row, "name").unwrap(), "OpenSSH ü");
        assert_eq!(opt_text(&row, "summary").unwrap(), None);
        assert_eq!(opt_text(&row, "cves").unwrap().as_deref(), Some("plain"));
        assert!(matches!(text(&row, "summary"), Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn vulnerability_row_decodes_from_blob_columns() {
        let pool = memory_pool().await;
        let row = sqlx::query(
            "SELECT CAST('oid-1' AS BLOB) AS vuln_id, CAST('SSL/TLS Weak Cipher' AS BLOB) AS name, \
             'nvt' AS category, 5.0 AS cvss_base, 'Medium' AS severity, NULL AS solution_type, \
             CAST('Weak ciphers accepted' AS BLOB) AS summary, NULL AS cves, NULL AS solution, \
             NULL AS affected_software, CAST('Legacy config' AS BLOB) AS insight",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        let vuln = vulnerability_from_row(&row).unwrap();
        assert_eq!(vuln.vuln_id, "oid-1");
        assert_eq!(vuln.name, "SSL/TLS Weak Cipher");
        assert_eq!(vuln.category.as_deref(), Some("nvt"));
        assert_eq!(vuln.cvss_base, Some(5.0));
        assert_eq!(vuln.summary.as_deref(), Some("Weak ciphers accepted"));
        assert_eq!(vuln.insight.as_deref(), Some("Legacy config"));
        assert_eq!(vuln.cves, None);
    }

    #[tokio::test]
    async fn invalid_utf8_blob_is_query_error() {
        let pool = memory_pool().await;
        let row = sqlx::query("SELECT X'ff' AS name")
            .fetch_one(&pool)
            .await
            .unwrap();
        let err = text(&row, "name").unwrap_err();
        assert!(matches!(err, StoreError::Query(ref msg) if msg.contains("UTF-8")));
    }

    #[test]
    fn bad_stored_timestamp_is_query_error() {
        let err = parse_time("yesterday", "scan_start").unwrap_err();
        assert!(matches!(err, StoreError::Query(ref msg) if msg.contains("scan_start")));
    }
}
