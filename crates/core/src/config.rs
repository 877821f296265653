//! 설정 관리: openvas-sync.toml 파싱 및 런타임 설정
//!
//! [`SyncConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//! 설정은 생성자 인자로 명시적으로 전달되며, 전역 상태로 읽지 않습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`GMP_USER`, `DB_URL` 등 기존 변수명 및 `OPENVAS_SYNC_{SECTION}_{FIELD}` 형식)
//! 3. 설정 파일 (`openvas-sync.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), openvas_sync_core::error::SyncError> {
//! use openvas_sync_core::config::SyncConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드 (파일이 없으면 기본값)
//! let config = SyncConfig::load_optional("openvas-sync.toml").await?;
//! config.require_gmp()?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SyncConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SyncError};

/// CSV Results 리포트 형식 ID (gvmd 내장)
pub const CSV_REPORT_FORMAT_ID: &str = "c1645568-627a-11e3-a660-406186ea4fc5";

/// 지원하는 데이터베이스 엔진
pub const DATABASE_ENGINES: [&str; 3] = ["postgres", "mysql", "sqlite"];

/// 중복 리포트 처리 정책 값
pub const DUPLICATE_POLICIES: [&str; 2] = ["skip", "fail"];

/// 행 실패 처리 정책 값
pub const ROW_ERROR_POLICIES: [&str; 2] = ["skip-row", "abort-report"];

const MAX_REQUEST_TIMEOUT_SECS: u64 = 3600;
const MAX_RESPONSE_BYTES: usize = 1024 * 1024 * 1024; // 1 GiB
const MAX_DB_CONNECTIONS: u32 = 100;

/// 마스킹된 비밀번호 표시
const REDACTED: &str = "********";

/// openvas-sync 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캐닝 엔진(GMP) 연결 설정
    #[serde(default)]
    pub gmp: GmpConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 수집 정책 설정
    #[serde(default)]
    pub ingest: IngestSettings,
}

impl SyncConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 파일이 없으면 `ConfigError::FileNotFound`를 반환합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// [`load`](Self::load)와 같지만, 파일이 없으면 기본값에서 시작합니다.
    ///
    /// 환경변수만으로 구성하는 기존 사용 방식을 지원합니다.
    pub async fn load_optional(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let mut config = match Self::from_file(path.as_ref()).await {
            Ok(config) => config,
            Err(SyncError::Config(ConfigError::FileNotFound { path })) => {
                tracing::debug!(path = %path, "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SyncError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SyncError> {
        toml::from_str(toml_str).map_err(|e| {
            SyncError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 기존 도구의 변수명(`GMP_SOCKET`, `GMP_USER`, `GMP_PASS`, `DB_ENGINE`,
    /// `DB_URL`, `DB_USER`, `DB_PASS`, `DB_DATABASE`)을 그대로 지원하고,
    /// 나머지 필드는 `OPENVAS_SYNC_{SECTION}_{FIELD}` 규칙을 따릅니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "OPENVAS_SYNC_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "OPENVAS_SYNC_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "OPENVAS_SYNC_GENERAL_DATA_DIR");

        // GMP
        override_string(&mut self.gmp.socket_path, "GMP_SOCKET");
        override_string(&mut self.gmp.username, "GMP_USER");
        override_string(&mut self.gmp.password, "GMP_PASS");
        override_parsed(
            &mut self.gmp.request_timeout_secs,
            "OPENVAS_SYNC_GMP_REQUEST_TIMEOUT_SECS",
        );
        override_string(
            &mut self.gmp.report_format_id,
            "OPENVAS_SYNC_GMP_REPORT_FORMAT_ID",
        );
        override_opt_string(
            &mut self.gmp.metadata_format_id,
            "OPENVAS_SYNC_GMP_METADATA_FORMAT_ID",
        );
        override_string(&mut self.gmp.report_filter, "OPENVAS_SYNC_GMP_REPORT_FILTER");
        override_parsed(
            &mut self.gmp.max_response_bytes,
            "OPENVAS_SYNC_GMP_MAX_RESPONSE_BYTES",
        );

        // Database
        override_string(&mut self.database.engine, "DB_ENGINE");
        override_string(&mut self.database.url, "DB_URL");
        override_string(&mut self.database.username, "DB_USER");
        override_string(&mut self.database.password, "DB_PASS");
        override_string(&mut self.database.database, "DB_DATABASE");
        override_parsed(
            &mut self.database.max_connections,
            "OPENVAS_SYNC_DATABASE_MAX_CONNECTIONS",
        );
        override_parsed(
            &mut self.database.connect_timeout_secs,
            "OPENVAS_SYNC_DATABASE_CONNECT_TIMEOUT_SECS",
        );
        override_parsed(
            &mut self.database.create_schema,
            "OPENVAS_SYNC_DATABASE_CREATE_SCHEMA",
        );

        // Ingest
        override_string(
            &mut self.ingest.on_duplicate_report,
            "OPENVAS_SYNC_INGEST_ON_DUPLICATE_REPORT",
        );
        override_string(&mut self.ingest.on_row_error, "OPENVAS_SYNC_INGEST_ON_ROW_ERROR");
    }

    /// 설정값의 형식 유효성을 검증합니다.
    ///
    /// 자격 증명 같은 필수 값의 존재 여부는 [`require_gmp`](Self::require_gmp),
    /// [`require_database`](Self::require_database)에서 명령별로 검사합니다.
    pub fn validate(&self) -> Result<(), SyncError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.data_dir.is_empty() {
            return Err(invalid("general.data_dir", "must not be empty".to_owned()));
        }

        if self.gmp.request_timeout_secs == 0
            || self.gmp.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS
        {
            return Err(invalid(
                "gmp.request_timeout_secs",
                format!("must be 1-{MAX_REQUEST_TIMEOUT_SECS}"),
            ));
        }

        if self.gmp.max_response_bytes == 0 || self.gmp.max_response_bytes > MAX_RESPONSE_BYTES {
            return Err(invalid(
                "gmp.max_response_bytes",
                format!("must be 1-{MAX_RESPONSE_BYTES}"),
            ));
        }

        if self.gmp.report_format_id.trim().is_empty() {
            return Err(invalid("gmp.report_format_id", "must not be empty".to_owned()));
        }

        if !DATABASE_ENGINES.contains(&self.database.engine.as_str()) {
            return Err(invalid(
                "database.engine",
                format!("must be one of: {}", DATABASE_ENGINES.join(", ")),
            ));
        }

        if self.database.max_connections == 0 || self.database.max_connections > MAX_DB_CONNECTIONS
        {
            return Err(invalid(
                "database.max_connections",
                format!("must be 1-{MAX_DB_CONNECTIONS}"),
            ));
        }

        if self.database.connect_timeout_secs == 0 {
            return Err(invalid(
                "database.connect_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if !DUPLICATE_POLICIES.contains(&self.ingest.on_duplicate_report.as_str()) {
            return Err(invalid(
                "ingest.on_duplicate_report",
                format!("must be one of: {}", DUPLICATE_POLICIES.join(", ")),
            ));
        }

        if !ROW_ERROR_POLICIES.contains(&self.ingest.on_row_error.as_str()) {
            return Err(invalid(
                "ingest.on_row_error",
                format!("must be one of: {}", ROW_ERROR_POLICIES.join(", ")),
            ));
        }

        Ok(())
    }

    /// 스캐닝 엔진 연결에 필요한 값이 모두 있는지 확인합니다.
    pub fn require_gmp(&self) -> Result<(), SyncError> {
        require("gmp.socket_path", &self.gmp.socket_path)?;
        require("gmp.username", &self.gmp.username)?;
        require("gmp.password", &self.gmp.password)?;
        Ok(())
    }

    /// 데이터베이스 연결에 필요한 값이 모두 있는지 확인합니다.
    ///
    /// SQLite는 파일 경로(`url`)만 필요합니다.
    pub fn require_database(&self) -> Result<(), SyncError> {
        require("database.url", &self.database.url)?;
        if self.database.engine != "sqlite" {
            require("database.username", &self.database.username)?;
            require("database.password", &self.database.password)?;
            require("database.database", &self.database.database)?;
        }
        Ok(())
    }

    /// 비밀번호를 가린 사본을 반환합니다 (출력용).
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.gmp.password.is_empty() {
            copy.gmp.password = REDACTED.to_owned();
        }
        if !copy.database.password.is_empty() {
            copy.database.password = REDACTED.to_owned();
        }
        copy
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 디코딩된 CSV 아티팩트 저장 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            data_dir: "data".to_owned(),
        }
    }
}

/// 스캐닝 엔진(GMP) 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmpConfig {
    /// gvmd Unix 소켓 경로
    pub socket_path: String,
    /// 사용자명
    pub username: String,
    /// 비밀번호
    pub password: String,
    /// 요청당 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 페이로드 리포트 형식 ID (기본: CSV Results)
    pub report_format_id: String,
    /// 메타데이터용 리포트 형식 ID (없으면 페이로드 엔벨로프 사용)
    pub metadata_format_id: Option<String>,
    /// `get_reports` 필터
    pub report_filter: String,
    /// 응답 최대 크기 (바이트)
    pub max_response_bytes: usize,
}

impl Default for GmpConfig {
    fn default() -> Self {
        Self {
            socket_path: "/run/gvmd/gvmd.sock".to_owned(),
            username: String::new(),
            password: String::new(),
            request_timeout_secs: 300,
            report_format_id: CSV_REPORT_FORMAT_ID.to_owned(),
            metadata_format_id: None,
            report_filter: "rows=-1".to_owned(),
            max_response_bytes: 256 * 1024 * 1024, // 256 MB
        }
    }
}

/// 데이터베이스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 엔진 (postgres, mysql, sqlite)
    pub engine: String,
    /// `host[:port]` (sqlite는 파일 경로)
    pub url: String,
    /// 사용자명
    pub username: String,
    /// 비밀번호
    pub password: String,
    /// 데이터베이스 이름
    pub database: String,
    /// 커넥션 풀 최대 크기
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 시작 시 테이블 생성 여부
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: "postgres".to_owned(),
            url: "localhost:5432".to_owned(),
            username: String::new(),
            password: String::new(),
            database: "openvas".to_owned(),
            max_connections: 5,
            connect_timeout_secs: 30,
            create_schema: true,
        }
    }
}

/// 수집 정책 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// 이미 저장된 리포트 ID를 만났을 때 (skip, fail)
    pub on_duplicate_report: String,
    /// 행 파싱/저장 실패 시 (skip-row, abort-report)
    pub on_row_error: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            on_duplicate_report: "skip".to_owned(),
            on_row_error: "skip-row".to_owned(),
        }
    }
}

fn invalid(field: &str, reason: String) -> SyncError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

fn require(field: &str, value: &str) -> Result<(), SyncError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingValue {
            field: field.to_owned(),
        }
        .into());
    }
    Ok(())
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_opt_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = if val.trim().is_empty() { None } else { Some(val) };
    }
}

/// 파싱에 실패한 값은 경고 후 무시합니다.
fn override_parsed<T: FromStr>(target: &mut T, env_key: &str) {
    let Ok(val) = std::env::var(env_key) else {
        return;
    };
    match val.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(
            env_key,
            value = val.as_str(),
            expected = std::any::type_name::<T>(),
            "ignoring unparsable env override"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = SyncConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.gmp.report_format_id, CSV_REPORT_FORMAT_ID);
        assert_eq!(config.database.engine, "postgres");
        assert_eq!(config.ingest.on_duplicate_report, "skip");
        assert!(config.gmp.metadata_format_id.is_none());
    }

    #[test]
    fn default_config_is_valid() {
        SyncConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_toml_keeps_defaults() {
        let config = SyncConfig::parse(
            r#"
[gmp]
username = "admin"

[database]
engine = "mysql"
"#,
        )
        .unwrap();
        assert_eq!(config.gmp.username, "admin");
        assert_eq!(config.gmp.request_timeout_secs, 300);
        assert_eq!(config.database.engine, "mysql");
        assert_eq!(config.database.database, "openvas");
    }

    #[test]
    fn parse_invalid_toml_fails() {
        let err = SyncConfig::parse("[gmp").unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn validate_rejects_unknown_engine() {
        let mut config = SyncConfig::default();
        config.database.engine = "oracle".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database.engine"));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = SyncConfig::default();
        config.gmp.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_policies() {
        let mut config = SyncConfig::default();
        config.ingest.on_duplicate_report = "overwrite".to_owned();
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.ingest.on_row_error = "panic".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn require_gmp_reports_first_missing_field() {
        let mut config = SyncConfig::default();
        config.gmp.username = "admin".to_owned();
        let err = config.require_gmp().unwrap_err();
        match err {
            SyncError::Config(ConfigError::MissingValue { field }) => {
                assert_eq!(field, "gmp.password")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn require_database_sqlite_needs_only_path() {
        let mut config = SyncConfig::default();
        config.database.engine = "sqlite".to_owned();
        config.database.url = "/tmp/openvas.db".to_owned();
        config.require_database().unwrap();

        config.database.engine = "postgres".to_owned();
        assert!(config.require_database().is_err());
    }

    #[test]
    fn redacted_masks_passwords() {
        let mut config = SyncConfig::default();
        config.gmp.password = "secret".to_owned();
        let shown = config.redacted();
        assert_eq!(shown.gmp.password, REDACTED);
        assert!(shown.database.password.is_empty());
        assert_eq!(config.gmp.password, "secret");
    }

    #[test]
    #[serial]
    fn legacy_env_vars_override_file_values() {
        let mut config = SyncConfig::default();
        unsafe {
            std::env::set_var("GMP_USER", "scanner");
            std::env::set_var("DB_ENGINE", "mysql");
        }
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("GMP_USER");
            std::env::remove_var("DB_ENGINE");
        }
        assert_eq!(config.gmp.username, "scanner");
        assert_eq!(config.database.engine, "mysql");
    }

    #[test]
    #[serial]
    fn bad_numeric_env_var_is_ignored() {
        let mut config = SyncConfig::default();
        unsafe { std::env::set_var("OPENVAS_SYNC_GMP_REQUEST_TIMEOUT_SECS", "soon") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("OPENVAS_SYNC_GMP_REQUEST_TIMEOUT_SECS") };
        assert_eq!(config.gmp.request_timeout_secs, 300);
    }

    #[test]
    #[serial]
    fn empty_metadata_format_env_clears_value() {
        let mut config = SyncConfig::default();
        config.gmp.metadata_format_id = Some("a994b278-1f62-11e1-96ac-406186ea4fc5".to_owned());
        unsafe { std::env::set_var("OPENVAS_SYNC_GMP_METADATA_FORMAT_ID", "") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("OPENVAS_SYNC_GMP_METADATA_FORMAT_ID") };
        assert!(config.gmp.metadata_format_id.is_none());
    }
}
