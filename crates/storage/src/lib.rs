//! openvas-sync 저장소
//!
//! 리포트, 취약점, 리포트-취약점 연관(finding)을 저장합니다.
//!
//! # 모듈 구성
//!
//! - [`error`]: 저장소 에러 (`StoreError`)
//! - [`repository`]: 엔티티별 저장소 trait (`ReportRepository`, `VulnerabilityRepository`,
//!   `FindingRepository`, `Store`)
//! - [`config`]: 연결 설정 (`StoreConfig`, `Dialect`)
//! - [`sql`]: PostgreSQL / MySQL / SQLite 구현 (`SqlStore`)
//! - [`memory`]: 인메모리 구현 (`MemoryStore`)
//!
//! # 취약점 중복 제거
//!
//! 취약점은 이름이 자연 키이고 `vuln_id`가 기본 키입니다.
//! `find_or_create_vulnerability`는 원자적 insert-if-absent 후 이름, 그 다음 ID로
//! 조회하므로 두 경로 모두 같은 저장 행으로 귀결됩니다.

pub mod config;
pub mod error;
pub mod memory;
pub mod repository;
mod schema;
pub mod sql;

// --- Public API Re-exports ---

pub use config::{Dialect, StoreConfig};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use repository::{FindingRepository, ReportRepository, Store, VulnerabilityRepository};
pub use sql::SqlStore;
