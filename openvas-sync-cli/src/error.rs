//! CLI-specific error types and exit code mapping

use openvas_sync_core::error::SyncError;
use openvas_sync_gmp::GmpClientError;
use openvas_sync_ingest::IngestError;
use openvas_sync_storage::StoreError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// gvmd unreachable or credentials rejected.
    #[error("scanner unavailable: {0}")]
    Scanner(String),

    /// Database unreachable or a query failed.
    #[error("database error: {0}")]
    Database(String),

    /// The ingestion pass finished but some reports or rows failed.
    #[error("ingestion incomplete: {0}")]
    IngestIncomplete(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                 |
    /// |------|-----------------------------------------|
    /// | 0    | Success                                 |
    /// | 1    | General / command error                 |
    /// | 2    | Configuration error                     |
    /// | 3    | gvmd unreachable or authentication      |
    /// | 4    | Database error                          |
    /// | 5    | Ingestion finished with failures        |
    /// | 10   | IO error                                |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Scanner(_) => 3,
            Self::Database(_) => 4,
            Self::IngestIncomplete(_) => 5,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Config(e) => Self::Config(e.to_string()),
            SyncError::Gmp(e) => Self::Scanner(e.to_string()),
            SyncError::Storage(e) => Self::Database(e.to_string()),
            SyncError::Ingest(e) => Self::Command(e.to_string()),
            SyncError::Io(e) => Self::Io(e),
        }
    }
}

impl From<GmpClientError> for CliError {
    fn from(err: GmpClientError) -> Self {
        SyncError::from(err).into()
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        SyncError::from(err).into()
    }
}

impl From<IngestError> for CliError {
    fn from(err: IngestError) -> Self {
        SyncError::from(err).into()
    }
}
