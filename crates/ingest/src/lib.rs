//! openvas-sync 수집 파이프라인
//!
//! GMP에서 받은 리포트 엔벨로프를 디코딩하고, 메타데이터와 CSV 행을
//! 도메인 레코드로 변환한 뒤 저장소에 기록합니다.
//!
//! # 모듈 구성
//!
//! - [`payload`]: base64 페이로드 디코딩, `<data_dir>/<report_id>.csv` 아티팩트 (`ArtifactStore`)
//! - [`metadata`]: 리포트 메타데이터 추출 (`extract_metadata`)
//! - [`rows`]: 위치 기반 CSV 행 파싱 (`parse_rows`)
//! - [`ingestor`]: 오케스트레이터 (`Ingestor`)
//! - [`summary`]: 실행 결과 요약 (`IngestSummary`, `FailureRecord`)
//! - [`config`]: 수집 설정과 정책 (`IngestConfig`, `IngestConfigBuilder`)
//! - [`error`]: 수집 에러 (`IngestError`, `RowParseError`)
//!
//! # 실패 처리
//!
//! 리포트 목록 조회 실패만 실행 전체를 중단합니다. 조회, 디코딩, 메타데이터,
//! 리포트 저장 실패는 해당 리포트만 건너뛰고, 행 실패는
//! [`RowFailurePolicy`]에 따라 행 또는 리포트 단위로 처리됩니다.

pub mod config;
pub mod error;
pub mod ingestor;
pub mod metadata;
pub mod payload;
pub mod rows;
pub mod summary;

// --- Public API Re-exports ---

pub use config::{DuplicateReportPolicy, IngestConfig, IngestConfigBuilder, RowFailurePolicy};
pub use error::{IngestError, RowParseError};
pub use ingestor::Ingestor;
pub use metadata::extract_metadata;
pub use payload::{ArtifactStore, decode_payload};
pub use rows::{ParsedRow, parse_rows};
pub use summary::{FailureRecord, IngestStage, IngestSummary, SkipRecord};
