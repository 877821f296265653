//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 리포트, 취약점, 리포트-취약점 연관(finding) 레코드를 정의합니다.
//! 파서와 추출기는 이 값 타입을 생성하고, 스토리지 계층만 식별자를 부여합니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 스캔 실행 상태
///
/// gvmd가 보고하는 `scan_run_status` 값을 나타냅니다.
/// 알 수 없는 값은 버리지 않고 [`ScanStatus::Other`]로 보존합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ScanStatus {
    Requested,
    Queued,
    Running,
    StopRequested,
    Stopped,
    Done,
    Interrupted,
    Processing,
    DeleteRequested,
    /// 목록에 없는 상태 문자열
    Other(String),
}

impl ScanStatus {
    /// gvmd 상태 문자열을 파싱합니다 (대소문자, 공백 무시).
    pub fn from_wire(s: &str) -> Self {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "requested" => Self::Requested,
            "queued" => Self::Queued,
            "running" => Self::Running,
            "stoprequested" => Self::StopRequested,
            "stopped" => Self::Stopped,
            "done" => Self::Done,
            "interrupted" => Self::Interrupted,
            "processing" => Self::Processing,
            "deleterequested" => Self::DeleteRequested,
            _ => Self::Other(s.trim().to_owned()),
        }
    }

    /// 저장용 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Requested => "Requested",
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::StopRequested => "Stop Requested",
            Self::Stopped => "Stopped",
            Self::Done => "Done",
            Self::Interrupted => "Interrupted",
            Self::Processing => "Processing",
            Self::DeleteRequested => "Delete Requested",
            Self::Other(s) => s,
        }
    }

    /// 스캔이 더 이상 진행되지 않는 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Stopped | Self::Interrupted)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ScanStatus {
    fn from(s: String) -> Self {
        Self::from_wire(&s)
    }
}

impl From<ScanStatus> for String {
    fn from(status: ScanStatus) -> Self {
        status.as_str().to_owned()
    }
}

/// 스캔 리포트
///
/// 하나의 스캔 실행에 대한 메타데이터입니다. `report_id`는 스캐닝 엔진이 부여한
/// 전역 고유 식별자이며 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// 리포트 ID (기본 키)
    pub report_id: String,
    /// 태스크 이름
    pub name: String,
    /// 생성 시각
    pub creation_time: DateTime<Utc>,
    /// 수정 시각
    pub modification_time: DateTime<Utc>,
    /// 소유자 이름
    pub owner_name: String,
    /// 스캔 시작 시각
    pub scan_start: DateTime<Utc>,
    /// 스캔 종료 시각 (실행 중이면 없음)
    pub scan_end: Option<DateTime<Utc>>,
    /// 스캔 상태
    pub scan_status: ScanStatus,
    /// 필터 적용 심각도
    pub severity: f64,
    /// 필터 적용 결과 수
    pub result_count: i64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Report({}, '{}', owner={}, status={}, severity={:.1}, results={})",
            self.report_id,
            self.name,
            self.owner_name,
            self.scan_status,
            self.severity,
            self.result_count,
        )
    }
}

/// 취약점 정의 (NVT)
///
/// 리포트 간에 공유되는 취약점 테스트 정의입니다. 이름이 자연 키이며
/// 같은 이름은 항상 하나의 저장 행으로 귀결됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// 테스트 식별자 (NVT OID)
    pub vuln_id: String,
    /// 취약점 이름 (중복 제거 키)
    pub name: String,
    /// 분류 (`nvt`, `cve`)
    pub category: Option<String>,
    /// CVSS 기본 점수
    pub cvss_base: Option<f64>,
    /// 정성적 심각도 (High, Medium, Low, Log)
    pub severity: Option<String>,
    /// 해결 방법 유형
    pub solution_type: Option<String>,
    /// 요약
    pub summary: Option<String>,
    /// 관련 CVE 목록 (자유 텍스트)
    pub cves: Option<String>,
    /// 해결 방법
    pub solution: Option<String>,
    /// 영향받는 소프트웨어/OS
    pub affected_software: Option<String>,
    /// 취약점 인사이트
    pub insight: Option<String>,
}

impl fmt::Display for Vulnerability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cvss_base {
            Some(score) => write!(f, "{} ({}, cvss={score:.1})", self.name, self.vuln_id),
            None => write!(f, "{} ({})", self.name, self.vuln_id),
        }
    }
}

/// 리포트-취약점 연관 값 (식별자 부여 전)
///
/// CSV 한 행에서 파싱된 하나의 탐지 결과입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    /// 소속 리포트 ID
    pub report_id: String,
    /// 참조 취약점 ID
    pub vuln_id: String,
    /// 대상 IP
    pub ip: Option<String>,
    /// 대상 호스트명
    pub hostname: Option<String>,
    /// 포트
    pub port: Option<String>,
    /// 포트 프로토콜
    pub protocol: Option<String>,
    /// 탐지 품질 (QoD)
    pub qod: Option<String>,
    /// 결과 상세 텍스트
    pub specific_result: Option<String>,
    /// 탐지 방법
    pub detection_method: Option<String>,
}

/// 저장된 리포트-취약점 연관 (finding)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// 스토리지가 부여한 식별자
    pub finding_id: String,
    #[serde(flatten)]
    pub record: FindingRecord,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}:{}/{} (report {})",
            self.record.vuln_id,
            self.record.ip.as_deref().unwrap_or("-"),
            self.record.port.as_deref().unwrap_or("-"),
            self.record.protocol.as_deref().unwrap_or("-"),
            self.record.report_id,
        )
    }
}
