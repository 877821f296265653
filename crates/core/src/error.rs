//! 에러 타입: 도메인별 에러 정의
//!
//! 각 크레이트는 자기 도메인의 상세 에러를 정의하고,
//! `From` 구현으로 최상위 [`SyncError`]로 변환합니다.

/// openvas-sync 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스캐닝 엔진(GMP) 통신 에러
    #[error("gmp error: {0}")]
    Gmp(#[from] GmpError),

    /// 리포트 수집(디코딩, 메타데이터, 행 파싱) 에러
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestFailure),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 필수 설정 값 누락
    #[error("missing required config value '{field}'")]
    MissingValue { field: String },
}

/// 스캐닝 엔진 통신 에러
#[derive(Debug, thiserror::Error)]
pub enum GmpError {
    /// 소켓에 연결할 수 없음
    #[error("connection failed: {0}")]
    Connection(String),

    /// 자격 증명 거부
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// 요청/응답 단계의 실패 (에러 상태, 타임아웃, 프로토콜 위반)
    #[error("transport failed: {0}")]
    Transport(String),
}

/// 리포트 수집 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestFailure {
    /// 엔벨로프 또는 base64 페이로드 디코딩 실패
    #[error("decode failed: {0}")]
    Decode(String),

    /// 필수 메타데이터 누락 또는 파싱 불가
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    /// CSV 행 파싱 실패
    #[error("row parse failed: {0}")]
    RowParse(String),
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 식별자 충돌
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// 참조 무결성 위반
    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    /// 대상 레코드 없음
    #[error("not found: {0}")]
    NotFound(String),

    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),
}
