//! 수집 파이프라인 설정
//!
//! [`IngestConfig`]는 core의 [`SyncConfig`]에서 파생되며
//! 중복 리포트 정책과 행 실패 정책을 명시적인 열거형으로 보관합니다.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use openvas_sync_core::config::{CSV_REPORT_FORMAT_ID, SyncConfig};

use crate::error::IngestError;

/// 이미 저장된 리포트를 다시 만났을 때의 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateReportPolicy {
    /// 이미 수집된 리포트로 보고 건너뜀 (재실행 멱등성)
    #[default]
    Skip,
    /// 리포트 실패로 기록
    Fail,
}

impl DuplicateReportPolicy {
    /// 설정 파일 표기
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Fail => "fail",
        }
    }
}

impl FromStr for DuplicateReportPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(IngestError::Config {
                field: "on_duplicate_report".to_owned(),
                reason: format!("unknown policy '{other}', expected skip or fail"),
            }),
        }
    }
}

impl fmt::Display for DuplicateReportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CSV 행 하나가 파싱 또는 저장에 실패했을 때의 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowFailurePolicy {
    /// 실패한 행만 기록하고 나머지 행을 계속 처리
    #[default]
    SkipRow,
    /// 리포트 전체를 실패로 처리하고 이미 저장한 내용을 삭제
    AbortReport,
}

impl RowFailurePolicy {
    /// 설정 파일 표기
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkipRow => "skip-row",
            Self::AbortReport => "abort-report",
        }
    }
}

impl FromStr for RowFailurePolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip-row" => Ok(Self::SkipRow),
            "abort-report" => Ok(Self::AbortReport),
            other => Err(IngestError::Config {
                field: "on_row_error".to_owned(),
                reason: format!("unknown policy '{other}', expected skip-row or abort-report"),
            }),
        }
    }
}

impl fmt::Display for RowFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 수집 파이프라인 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// CSV 아티팩트 저장 디렉토리
    pub data_dir: PathBuf,
    /// 페이로드 요청에 사용할 리포트 포맷 ID
    pub report_format_id: String,
    /// 메타데이터 전용 포맷 ID (없으면 페이로드 엔벨로프에서 추출)
    pub metadata_format_id: Option<String>,
    /// 중복 리포트 정책
    pub on_duplicate_report: DuplicateReportPolicy,
    /// 행 실패 정책
    pub on_row_error: RowFailurePolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            report_format_id: CSV_REPORT_FORMAT_ID.to_owned(),
            metadata_format_id: None,
            on_duplicate_report: DuplicateReportPolicy::default(),
            on_row_error: RowFailurePolicy::default(),
        }
    }
}

impl IngestConfig {
    /// core 설정에서 수집 설정을 생성합니다.
    pub fn from_core(core: &SyncConfig) -> Result<Self, IngestError> {
        let config = Self {
            data_dir: PathBuf::from(&core.general.data_dir),
            report_format_id: core.gmp.report_format_id.clone(),
            metadata_format_id: core
                .gmp
                .metadata_format_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
            on_duplicate_report: core.ingest.on_duplicate_report.parse()?,
            on_row_error: core.ingest.on_row_error.parse()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(IngestError::Config {
                field: "data_dir".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.report_format_id.trim().is_empty() {
            return Err(IngestError::Config {
                field: "report_format_id".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if let Some(id) = &self.metadata_format_id {
            if id.trim().is_empty() {
                return Err(IngestError::Config {
                    field: "metadata_format_id".to_owned(),
                    reason: "must not be blank when set".to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// [`IngestConfig`] 빌더
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 아티팩트 디렉토리를 설정합니다.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// 리포트 포맷 ID를 설정합니다.
    pub fn report_format_id(mut self, id: impl Into<String>) -> Self {
        self.config.report_format_id = id.into();
        self
    }

    /// 메타데이터 전용 포맷 ID를 설정합니다.
    pub fn metadata_format_id(mut self, id: impl Into<String>) -> Self {
        self.config.metadata_format_id = Some(id.into());
        self
    }

    /// 중복 리포트 정책을 설정합니다.
    pub fn on_duplicate_report(mut self, policy: DuplicateReportPolicy) -> Self {
        self.config.on_duplicate_report = policy;
        self
    }

    /// 행 실패 정책을 설정합니다.
    pub fn on_row_error(mut self, policy: RowFailurePolicy) -> Self {
        self.config.on_row_error = policy;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
