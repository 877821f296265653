//! 수집 실행 결과 요약

use std::fmt;

use serde::Serialize;

/// 실패가 발생한 파이프라인 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    /// 리포트 목록 조회
    List,
    /// 리포트 엔벨로프 조회
    Fetch,
    /// 엔벨로프/페이로드 디코딩 및 아티팩트 저장
    Decode,
    /// 메타데이터 추출
    Metadata,
    /// 리포트 행 저장
    PersistReport,
    /// CSV 행 파싱
    ParseRow,
    /// 취약점/finding 저장
    PersistRow,
}

impl IngestStage {
    /// 로그 및 출력용 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Fetch => "fetch",
            Self::Decode => "decode",
            Self::Metadata => "metadata",
            Self::PersistReport => "persist_report",
            Self::ParseRow => "parse_row",
            Self::PersistRow => "persist_row",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 개별 실패 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// 대상 리포트 ID
    pub report_id: String,
    /// 행 단위 실패일 때의 행 번호 (헤더 = 0)
    pub row_index: Option<usize>,
    /// 실패 단계
    pub stage: IngestStage,
    /// 실패 사유
    pub reason: String,
}

/// 건너뛴 리포트 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipRecord {
    /// 대상 리포트 ID
    pub report_id: String,
    /// 건너뛴 사유
    pub reason: String,
}

/// 한 번의 수집 실행 결과
///
/// 실패한 행과 리포트는 모두 `failures`에, 건너뛴 리포트는 `skipped`에
/// 사유와 함께 기록됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// 목록 조회로 얻은 리포트 수
    pub reports_listed: usize,
    /// 저장에 성공한 리포트 수
    pub reports_succeeded: usize,
    /// 이미 저장되어 건너뛴 리포트 수
    pub reports_skipped: usize,
    /// 실패한 리포트 수
    pub reports_failed: usize,
    /// 저장된 finding 수
    pub rows_succeeded: usize,
    /// 파싱 또는 저장에 실패한 행 수
    pub rows_failed: usize,
    /// 취소 요청으로 중단되었는지 여부
    pub cancelled: bool,
    /// 실패 목록
    pub failures: Vec<FailureRecord>,
    /// 건너뛴 리포트 목록
    pub skipped: Vec<SkipRecord>,
}

impl IngestSummary {
    /// 실패가 하나라도 있는지 확인합니다.
    pub fn has_failures(&self) -> bool {
        self.reports_failed > 0 || self.rows_failed > 0
    }

    /// 처리되지 않고 남은 리포트 수 (취소 시)
    pub fn reports_pending(&self) -> usize {
        self.reports_listed.saturating_sub(
            self.reports_succeeded + self.reports_skipped + self.reports_failed,
        )
    }

    pub(crate) fn fail(
        &mut self,
        report_id: &str,
        row_index: Option<usize>,
        stage: IngestStage,
        reason: impl Into<String>,
    ) {
        self.failures.push(FailureRecord {
            report_id: report_id.to_owned(),
            row_index,
            stage,
            reason: reason.into(),
        });
    }
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reports: {} succeeded, {} skipped, {} failed; rows: {} succeeded, {} failed",
            self.reports_succeeded,
            self.reports_skipped,
            self.reports_failed,
            self.rows_succeeded,
            self.rows_failed
        )?;
        if self.cancelled {
            write!(f, " (cancelled, {} pending)", self.reports_pending())?;
        }
        Ok(())
    }
}
