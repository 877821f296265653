//! 저장소 에러 타입
//!
//! [`StoreError`]는 저장소 구현(SQL, 인메모리) 공통 에러입니다.
//! `From<StoreError> for SyncError` 변환으로 상위 레이어에 전파됩니다.

use openvas_sync_core::error::{ConfigError, StorageError, SyncError};

/// 저장소 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 식별자 또는 자연 키 충돌
    #[error("duplicate {entity} '{key}'")]
    DuplicateKey {
        /// 엔티티 종류 (report, vulnerability, finding)
        entity: &'static str,
        /// 충돌한 키
        key: String,
    },

    /// 참조 무결성 위반
    #[error("{entity} '{key}' violates a reference: {reason}")]
    ForeignKey {
        /// 엔티티 종류
        entity: &'static str,
        /// 대상 키
        key: String,
        /// 위반 내용
        reason: String,
    },

    /// 대상 레코드 없음
    #[error("{entity} '{key}' not found")]
    NotFound {
        /// 엔티티 종류
        entity: &'static str,
        /// 조회 키
        key: String,
    },

    /// 연결 실패
    #[error("database connection error: {0}")]
    Connection(String),

    /// 쿼리 실행 또는 결과 디코딩 실패
    #[error("query error: {0}")]
    Query(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Connection(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { .. } => {
                SyncError::Storage(StorageError::DuplicateKey(err.to_string()))
            }
            StoreError::ForeignKey { .. } => {
                SyncError::Storage(StorageError::ForeignKey(err.to_string()))
            }
            StoreError::NotFound { .. } => {
                SyncError::Storage(StorageError::NotFound(err.to_string()))
            }
            StoreError::Connection(msg) => SyncError::Storage(StorageError::Connection(msg)),
            StoreError::Query(msg) => SyncError::Storage(StorageError::Query(msg)),
            StoreError::Config { field, reason } => {
                SyncError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
