//! openvas-sync 공통 크레이트
//!
//! 모든 크레이트가 공유하는 도메인 타입, 에러, 설정, 메트릭 상수를 제공합니다.
//!
//! - [`types`]: 리포트, 취약점, finding 값 타입
//! - [`error`]: 최상위 [`SyncError`]와 도메인별 에러
//! - [`config`]: `openvas-sync.toml` 로딩 및 환경변수 오버라이드
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, GmpError, IngestFailure, StorageError, SyncError};

// 설정
pub use config::SyncConfig;

// 도메인 타입
pub use types::{Finding, FindingRecord, Report, ScanStatus, Vulnerability};
