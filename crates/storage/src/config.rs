//! 저장소 설정
//!
//! [`StoreConfig`]는 core의 [`DatabaseConfig`]에서 파생되며,
//! 엔진별 연결 URL을 조립합니다.

use std::fmt;
use std::time::Duration;

use openvas_sync_core::config::DatabaseConfig;

use crate::error::StoreError;

/// 지원하는 SQL 방언
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// 설정의 `engine` 값을 해석합니다.
    pub fn from_engine(engine: &str) -> Result<Self, StoreError> {
        match engine.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(StoreError::Config {
                field: "engine".to_owned(),
                reason: format!("unsupported database engine '{other}'"),
            }),
        }
    }

    /// URL 스킴에서 방언을 추론합니다.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?;
        Self::from_engine(scheme).ok()
    }

    /// 엔진 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 저장소 설정
#[derive(Clone)]
pub struct StoreConfig {
    /// SQL 방언
    pub dialect: Dialect,
    /// `host[:port]`, sqlite 파일 경로, 또는 완전한 연결 URL
    pub url: String,
    /// 사용자명
    pub username: String,
    /// 비밀번호
    pub password: String,
    /// 데이터베이스 이름
    pub database: String,
    /// 커넥션 풀 최대 크기
    pub max_connections: u32,
    /// 연결 획득 타임아웃
    pub connect_timeout: Duration,
    /// 연결 시 테이블 생성 여부
    pub create_schema: bool,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("dialect", &self.dialect)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"********")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("create_schema", &self.create_schema)
            .finish()
    }
}

impl StoreConfig {
    /// core 설정에서 저장소 설정을 생성합니다.
    pub fn from_core(core: &DatabaseConfig) -> Result<Self, StoreError> {
        Ok(Self {
            dialect: Dialect::from_engine(&core.engine)?,
            url: core.url.clone(),
            username: core.username.clone(),
            password: core.password.clone(),
            database: core.database.clone(),
            max_connections: core.max_connections,
            connect_timeout: Duration::from_secs(core.connect_timeout_secs),
            create_schema: core.create_schema,
        })
    }

    /// 로컬 SQLite 파일 설정을 생성합니다.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            dialect: Dialect::Sqlite,
            url: path.into(),
            username: String::new(),
            password: String::new(),
            database: String::new(),
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            create_schema: true,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.url.trim().is_empty() {
            return Err(StoreError::Config {
                field: "url".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.max_connections == 0 {
            return Err(StoreError::Config {
                field: "max_connections".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if let Some(from_url) = Dialect::from_url(&self.url) {
            if self.url.contains("://") && from_url != self.dialect {
                return Err(StoreError::Config {
                    field: "url".to_owned(),
                    reason: format!(
                        "url scheme '{from_url}' does not match engine '{}'",
                        self.dialect
                    ),
                });
            }
        }
        if self.dialect != Dialect::Sqlite
            && !self.url.contains("://")
            && self.database.trim().is_empty()
        {
            return Err(StoreError::Config {
                field: "database".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    /// sqlx 연결 URL을 조립합니다.
    ///
    /// `url`이 이미 스킴을 포함하면 그대로 사용합니다.
    pub fn connection_url(&self) -> String {
        if self.url.contains("://") || self.url.starts_with("sqlite:") {
            return self.url.clone();
        }
        match self.dialect {
            Dialect::Sqlite if self.url == ":memory:" => "sqlite::memory:".to_owned(),
            Dialect::Sqlite => format!("sqlite://{}?mode=rwc", self.url),
            Dialect::Postgres | Dialect::MySql => {
                let credentials = if self.username.is_empty() {
                    String::new()
                } else if self.password.is_empty() {
                    format!("{}@", encode_userinfo(&self.username))
                } else {
                    format!(
                        "{}:{}@",
                        encode_userinfo(&self.username),
                        encode_userinfo(&self.password)
                    )
                };
                format!(
                    "{}://{credentials}{}/{}",
                    self.dialect, self.url, self.database
                )
            }
        }
    }

    /// 비밀번호를 가린 연결 URL (로그용)
    pub fn redacted_url(&self) -> String {
        let url = self.connection_url();
        if self.password.is_empty() {
            return url;
        }
        url.replace(&format!(":{}@", encode_userinfo(&self.password)), ":********@")
    }
}

/// URL userinfo에 허용되지 않는 문자를 퍼센트 인코딩합니다.
fn encode_userinfo(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
