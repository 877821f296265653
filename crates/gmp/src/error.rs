//! GMP 클라이언트 에러 타입
//!
//! [`GmpClientError`]는 스캐닝 엔진과의 통신에서 발생하는 모든 에러를 표현합니다.
//! `From<GmpClientError> for SyncError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use openvas_sync_core::error::{ConfigError, GmpError, SyncError};

/// GMP 클라이언트 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum GmpClientError {
    /// 소켓 연결 실패
    #[error("connection error: {0}")]
    Connection(String),

    /// 자격 증명 거부
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// 데몬이 에러 상태를 반환함
    #[error("command '{command}' failed with status {status}: {status_text}")]
    CommandFailed {
        /// GMP 명령 이름
        command: String,
        /// 응답 상태 코드
        status: String,
        /// 응답 상태 메시지
        status_text: String,
    },

    /// 요청 타임아웃
    #[error("command '{command}' timed out after {timeout_ms}ms")]
    Timeout {
        /// GMP 명령 이름
        command: String,
        /// 적용된 타임아웃 (밀리초)
        timeout_ms: u128,
    },

    /// 응답이 허용 크기를 초과함
    #[error("response exceeds {limit} bytes")]
    ResponseTooLarge {
        /// 허용 최대 크기
        limit: usize,
    },

    /// 응답 XML이 올바르지 않음
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// 리포트 ID 형식 위반
    #[error("invalid report id: {0}")]
    InvalidReportId(String),

    /// 소켓 I/O 실패 또는 세션 종료
    #[error("transport error: {0}")]
    Io(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<GmpClientError> for SyncError {
    fn from(err: GmpClientError) -> Self {
        match err {
            GmpClientError::Connection(msg) => SyncError::Gmp(GmpError::Connection(msg)),
            GmpClientError::Authentication(msg) => SyncError::Gmp(GmpError::Authentication(msg)),
            GmpClientError::Config { field, reason } => {
                SyncError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => SyncError::Gmp(GmpError::Transport(other.to_string())),
        }
    }
}
