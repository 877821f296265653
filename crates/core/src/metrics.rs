//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//! 레코더가 설치되지 않으면 매크로 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `openvas_sync_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// GMP 명령 레이블 키 (authenticate, get_reports, get_report)
pub const LABEL_COMMAND: &str = "command";

/// 결과 레이블 키
pub const LABEL_RESULT: &str = "result";

// ─── 레이블 값 상수 ────────────────────────────────────────────────

/// 리포트 수집 성공
pub const RESULT_INGESTED: &str = "ingested";

/// 이미 저장된 리포트 건너뜀
pub const RESULT_SKIPPED: &str = "skipped";

/// 실패
pub const RESULT_FAILED: &str = "failed";

/// 행 저장 성공
pub const RESULT_STORED: &str = "stored";

// ─── GMP 메트릭 ────────────────────────────────────────────────────

/// GMP: 전송한 요청 수 (counter, label: command)
pub const GMP_REQUESTS_TOTAL: &str = "openvas_sync_gmp_requests_total";

/// GMP: 에러 상태 또는 전송 실패 수 (counter, label: command)
pub const GMP_REQUEST_FAILURES_TOTAL: &str = "openvas_sync_gmp_request_failures_total";

/// GMP: 요청-응답 왕복 시간 (histogram, 초)
pub const GMP_REQUEST_DURATION_SECONDS: &str = "openvas_sync_gmp_request_duration_seconds";

// ─── Ingest 메트릭 ─────────────────────────────────────────────────

/// Ingest: 처리한 리포트 수 (counter, label: result)
pub const INGEST_REPORTS_TOTAL: &str = "openvas_sync_reports_total";

/// Ingest: 처리한 CSV 행 수 (counter, label: result)
pub const INGEST_ROWS_TOTAL: &str = "openvas_sync_rows_total";

/// Ingest: 리포트 하나의 수집 소요 시간 (histogram, 초)
pub const INGEST_REPORT_DURATION_SECONDS: &str = "openvas_sync_report_duration_seconds";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 레코더를 설치한 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    // GMP
    describe_counter!(
        GMP_REQUESTS_TOTAL,
        "Total number of GMP commands sent to the scanner daemon"
    );
    describe_counter!(
        GMP_REQUEST_FAILURES_TOTAL,
        "GMP commands that failed with an error status or transport fault"
    );
    describe_histogram!(
        GMP_REQUEST_DURATION_SECONDS,
        "GMP request/response round-trip time in seconds"
    );

    // Ingest
    describe_counter!(
        INGEST_REPORTS_TOTAL,
        "Reports processed by the ingestor (ingested, skipped, failed)"
    );
    describe_counter!(
        INGEST_ROWS_TOTAL,
        "CSV rows processed by the ingestor (stored, failed)"
    );
    describe_histogram!(
        INGEST_REPORT_DURATION_SECONDS,
        "Time spent ingesting a single report in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        GMP_REQUESTS_TOTAL,
        GMP_REQUEST_FAILURES_TOTAL,
        GMP_REQUEST_DURATION_SECONDS,
        INGEST_REPORTS_TOTAL,
        INGEST_ROWS_TOTAL,
        INGEST_REPORT_DURATION_SECONDS,
    ];

    #[test]
    fn metric_names_have_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("openvas_sync_"),
                "metric '{name}' must start with openvas_sync_"
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            GMP_REQUESTS_TOTAL,
            GMP_REQUEST_FAILURES_TOTAL,
            INGEST_REPORTS_TOTAL,
            INGEST_ROWS_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "counter '{name}' must end with _total");
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}
