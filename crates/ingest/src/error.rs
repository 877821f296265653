//! 수집 파이프라인 에러 타입
//!
//! [`IngestError`]는 디코딩, 메타데이터 추출, 행 파싱, 오케스트레이션 중의
//! 에러를 표현합니다. 하위 크레이트 에러(`GmpClientError`, `StoreError`)를 감싸며
//! `From<IngestError> for SyncError` 변환을 제공합니다.

use std::fmt;

use openvas_sync_core::error::{ConfigError, IngestFailure, SyncError};
use openvas_sync_gmp::GmpClientError;
use openvas_sync_storage::StoreError;

/// CSV 행 파싱 실패 위치와 사유
///
/// `row_index`는 헤더를 0번으로 센 행 번호입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowParseError {
    /// 행 번호 (헤더 = 0)
    pub row_index: usize,
    /// 문제가 된 열 번호 (0부터)
    pub column_index: usize,
    /// 실패 사유
    pub reason: String,
}

impl fmt::Display for RowParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {} column {}: {}",
            self.row_index, self.column_index, self.reason
        )
    }
}

impl std::error::Error for RowParseError {}

/// 수집 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 엔벨로프 또는 base64 페이로드 디코딩 실패
    #[error("decode error: {0}")]
    Decode(String),

    /// 필수 메타데이터 누락 또는 파싱 불가
    #[error("malformed metadata field '{field}': {reason}")]
    MalformedMetadata {
        /// 문제가 된 필드
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// CSV 행 파싱 실패
    #[error("row parse error: {0}")]
    RowParse(#[from] RowParseError),

    /// 아티팩트 파일 I/O 실패
    #[error("artifact error: {path}: {reason}")]
    Artifact {
        /// 대상 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 리포트 소스(GMP) 에러
    #[error(transparent)]
    Source(#[from] GmpClientError),

    /// 저장소 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl IngestError {
    pub(crate) fn metadata(field: &str, reason: impl Into<String>) -> Self {
        Self::MalformedMetadata {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<IngestError> for SyncError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Decode(msg) => SyncError::Ingest(IngestFailure::Decode(msg)),
            IngestError::MalformedMetadata { .. } => {
                SyncError::Ingest(IngestFailure::MalformedMetadata(err.to_string()))
            }
            IngestError::RowParse(row) => SyncError::Ingest(IngestFailure::RowParse(row.to_string())),
            IngestError::Artifact { path, reason } => {
                SyncError::Io(std::io::Error::other(format!("{path}: {reason}")))
            }
            IngestError::Source(e) => e.into(),
            IngestError::Store(e) => e.into(),
            IngestError::Config { field, reason } => {
                SyncError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
