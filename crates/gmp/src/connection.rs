//! Connection provider and GMP session.
//!
//! [`GmpConnector`] opens a Unix socket to gvmd and authenticates, handing
//! back a [`GmpSession`]. A session owns its socket: dropping it closes the
//! connection on every exit path, and [`GmpSession::close`] performs an
//! orderly shutdown.
//!
//! # Examples
//!
//! ```ignore
//! use openvas_sync_gmp::{GmpClientConfig, GmpConnector};
//!
//! let connector = GmpConnector::new(GmpClientConfig::from_core(&config.gmp))?;
//! let mut session = connector.connect().await?;
//! let version = session.version().await?;
//! session.close().await?;
//! ```

use std::time::{Duration, Instant};

use openvas_sync_core::config::GmpConfig;
use openvas_sync_core::metrics as m;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use crate::command::GmpCommand;
use crate::envelope::{DocumentFramer, Envelope};
use crate::error::GmpClientError;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// GMP 클라이언트 설정
///
/// core의 [`GmpConfig`]에서 파생되며, 타임아웃은 `Duration`으로 보관합니다.
#[derive(Clone)]
pub struct GmpClientConfig {
    /// gvmd Unix 소켓 경로
    pub socket_path: String,
    /// 사용자명
    pub username: String,
    /// 비밀번호
    pub password: String,
    /// 요청당 타임아웃 (연결 포함)
    pub request_timeout: Duration,
    /// 응답 최대 크기 (바이트)
    pub max_response_bytes: usize,
    /// `get_reports` 필터
    pub report_filter: String,
}

impl std::fmt::Debug for GmpClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmpClientConfig")
            .field("socket_path", &self.socket_path)
            .field("username", &self.username)
            .field("password", &"********")
            .field("request_timeout", &self.request_timeout)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("report_filter", &self.report_filter)
            .finish()
    }
}

impl GmpClientConfig {
    /// core 설정에서 클라이언트 설정을 생성합니다.
    pub fn from_core(core: &GmpConfig) -> Self {
        Self {
            socket_path: core.socket_path.clone(),
            username: core.username.clone(),
            password: core.password.clone(),
            request_timeout: Duration::from_secs(core.request_timeout_secs),
            max_response_bytes: core.max_response_bytes,
            report_filter: core.report_filter.clone(),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), GmpClientError> {
        for (field, value) in [
            ("socket_path", &self.socket_path),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.is_empty() {
                return Err(GmpClientError::Config {
                    field: field.to_owned(),
                    reason: "must not be empty".to_owned(),
                });
            }
        }
        if self.request_timeout.is_zero() {
            return Err(GmpClientError::Config {
                field: "request_timeout".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.max_response_bytes == 0 {
            return Err(GmpClientError::Config {
                field: "max_response_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}

/// Opens authenticated GMP sessions.
#[derive(Debug, Clone)]
pub struct GmpConnector {
    config: GmpClientConfig,
}

impl GmpConnector {
    /// Creates a connector after validating `config`.
    pub fn new(config: GmpClientConfig) -> Result<Self, GmpClientError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The connector's configuration.
    pub fn config(&self) -> &GmpClientConfig {
        &self.config
    }

    /// Connects to the socket without authenticating.
    ///
    /// Useful for `get_version`, which gvmd answers before authentication.
    ///
    /// # Errors
    ///
    /// `GmpClientError::Connection` if the socket is missing, refuses the
    /// connection, or does not accept within the request timeout.
    pub async fn connect_unauthenticated(&self) -> Result<GmpSession, GmpClientError> {
        let path = &self.config.socket_path;
        let stream = tokio::time::timeout(self.config.request_timeout, UnixStream::connect(path))
            .await
            .map_err(|_| {
                GmpClientError::Connection(format!(
                    "connect to {path} timed out after {:?}",
                    self.config.request_timeout
                ))
            })?
            .map_err(|e| GmpClientError::Connection(format!("connect to {path}: {e}")))?;

        debug!(socket = %path, "gmp socket connected");
        Ok(GmpSession {
            stream: Some(stream),
            request_timeout: self.config.request_timeout,
            max_response_bytes: self.config.max_response_bytes,
            report_filter: self.config.report_filter.clone(),
        })
    }

    /// Connects and authenticates with the configured credentials.
    ///
    /// # Errors
    ///
    /// - `GmpClientError::Connection`: endpoint unreachable
    /// - `GmpClientError::Authentication`: credentials rejected
    pub async fn connect(&self) -> Result<GmpSession, GmpClientError> {
        let mut session = self.connect_unauthenticated().await?;
        session
            .authenticate(&self.config.username, &self.config.password)
            .await?;
        info!(
            socket = %self.config.socket_path,
            user = %self.config.username,
            "gmp session authenticated"
        );
        Ok(session)
    }
}

/// An open GMP connection.
///
/// Requests are strictly sequential. After a timeout or transport failure
/// the response stream is out of sync and the session refuses further
/// requests.
#[derive(Debug)]
pub struct GmpSession {
    stream: Option<UnixStream>,
    request_timeout: Duration,
    max_response_bytes: usize,
    report_filter: String,
}

impl GmpSession {
    /// Sends `command` and returns its successful response envelope.
    ///
    /// # Errors
    ///
    /// - `GmpClientError::Timeout`: no complete response within the timeout
    /// - `GmpClientError::ResponseTooLarge`: response exceeds the size limit
    /// - `GmpClientError::InvalidResponse`: response is not well-formed XML
    /// - `GmpClientError::CommandFailed`: the daemon answered with a non-2xx status
    /// - `GmpClientError::Authentication`: non-2xx answer to `authenticate`
    /// - `GmpClientError::Io`: socket failure or session already broken
    pub async fn request(&mut self, command: &GmpCommand<'_>) -> Result<Envelope, GmpClientError> {
        let name = command.name();
        metrics::counter!(m::GMP_REQUESTS_TOTAL, m::LABEL_COMMAND => name).increment(1);
        let started = Instant::now();

        let result = self.exchange(command).await;
        metrics::histogram!(m::GMP_REQUEST_DURATION_SECONDS, m::LABEL_COMMAND => name)
            .record(started.elapsed().as_secs_f64());

        let result = result.and_then(|envelope| check_status(name, envelope));
        if let Err(e) = &result {
            metrics::counter!(m::GMP_REQUEST_FAILURES_TOTAL, m::LABEL_COMMAND => name)
                .increment(1);
            warn!(command = name, error = %e, "gmp request failed");
        }
        result
    }

    async fn exchange(&mut self, command: &GmpCommand<'_>) -> Result<Envelope, GmpClientError> {
        let name = command.name();
        let timeout = self.request_timeout;
        let max_bytes = self.max_response_bytes;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| GmpClientError::Io("session is closed".to_owned()))?;

        let outcome =
            tokio::time::timeout(timeout, send_and_receive(stream, command, max_bytes)).await;
        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                self.stream = None;
                return Err(e);
            }
            Err(_) => {
                self.stream = None;
                return Err(GmpClientError::Timeout {
                    command: name.to_owned(),
                    timeout_ms: timeout.as_millis(),
                });
            }
        };

        debug!(command = name, bytes = raw.len(), "gmp response received");
        let text = String::from_utf8(raw)
            .map_err(|e| GmpClientError::InvalidResponse(format!("response is not UTF-8: {e}")))?;
        Envelope::parse(&text).map_err(|e| GmpClientError::InvalidResponse(e.to_string()))
    }

    /// Authenticates the session.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<(), GmpClientError> {
        self.request(&GmpCommand::Authenticate { username, password })
            .await
            .map(|_| ())
    }

    /// Returns the protocol version reported by the daemon.
    pub async fn version(&mut self) -> Result<String, GmpClientError> {
        let envelope = self.request(&GmpCommand::GetVersion).await?;
        envelope
            .root()
            .child("version")
            .map(|v| v.text().to_owned())
            .ok_or_else(|| {
                GmpClientError::InvalidResponse("get_version response has no <version>".to_owned())
            })
    }

    /// The filter applied to `get_reports`.
    pub fn report_filter(&self) -> &str {
        &self.report_filter
    }

    /// True until the session is closed or broken by a failed exchange.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Shuts the connection down.
    pub async fn close(mut self) -> Result<(), GmpClientError> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .shutdown()
                .await
                .map_err(|e| GmpClientError::Io(format!("shutdown failed: {e}")))?;
            debug!("gmp session closed");
        }
        Ok(())
    }
}

async fn send_and_receive(
    stream: &mut UnixStream,
    command: &GmpCommand<'_>,
    max_bytes: usize,
) -> Result<Vec<u8>, GmpClientError> {
    stream
        .write_all(command.to_xml().as_bytes())
        .await
        .map_err(|e| GmpClientError::Io(format!("write failed: {e}")))?;

    let mut response = Vec::new();
    let mut framer = DocumentFramer::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| GmpClientError::Io(format!("read failed: {e}")))?;
        if n == 0 {
            return Err(GmpClientError::Io(format!(
                "connection closed after {} bytes, before the response was complete",
                response.len()
            )));
        }
        response.extend_from_slice(&chunk[..n]);
        if response.len() > max_bytes {
            return Err(GmpClientError::ResponseTooLarge { limit: max_bytes });
        }
        if framer.feed(&chunk[..n]) {
            return Ok(response);
        }
    }
}

fn check_status(command: &str, envelope: Envelope) -> Result<Envelope, GmpClientError> {
    if envelope.is_success() {
        return Ok(envelope);
    }
    let status = envelope.status().unwrap_or("missing").to_owned();
    let status_text = envelope.status_text().to_owned();
    if command == "authenticate" {
        return Err(GmpClientError::Authentication(format!(
            "status {status}: {status_text}"
        )));
    }
    Err(GmpClientError::CommandFailed {
        command: command.to_owned(),
        status,
        status_text,
    })
}
