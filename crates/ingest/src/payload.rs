//! Payload decoding and the on-disk artifact store.
//!
//! The CSV export format places the base64 encoded report body directly after
//! the `<report_format>` element of the report envelope.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use openvas_sync_gmp::{Envelope, validate_report_id};
use tracing::debug;

use crate::error::IngestError;

/// Element whose tail text carries the encoded report body.
pub const PAYLOAD_MARKER: &str = "report_format";

/// Extracts and decodes the embedded payload.
///
/// Returns `Ok(None)` when the marker is absent or its tail is empty.
///
/// # Errors
///
/// [`IngestError::Decode`] when the tail text is not valid base64.
pub fn decode_payload(envelope: &Envelope) -> Result<Option<Vec<u8>>, IngestError> {
    let Some(marker) = envelope.find(PAYLOAD_MARKER) else {
        return Ok(None);
    };
    let encoded: String = marker
        .tail()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if encoded.is_empty() {
        return Ok(None);
    }
    STANDARD
        .decode(encoded.as_bytes())
        .map(Some)
        .map_err(|e| IngestError::Decode(format!("invalid base64 payload: {e}")))
}

/// Report-scoped artifact files under a single data directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `dir`. Nothing is created until the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `report_id`.
    ///
    /// # Errors
    ///
    /// Rejects ids that are not safe file names.
    pub fn path_for(&self, report_id: &str) -> Result<PathBuf, IngestError> {
        validate_report_id(report_id)?;
        Ok(self.dir.join(format!("{report_id}.csv")))
    }

    /// Writes `bytes` to `<dir>/<report_id>.csv`, creating the directory on demand.
    pub async fn save(&self, report_id: &str, bytes: &[u8]) -> Result<PathBuf, IngestError> {
        let path = self.path_for(report_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| artifact_error(&self.dir, e))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| artifact_error(&path, e))?;
        debug!(report_id, path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(path)
    }

    /// Reads an artifact back.
    pub async fn read(&self, report_id: &str) -> Result<Vec<u8>, IngestError> {
        let path = self.path_for(report_id)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| artifact_error(&path, e))
    }

    /// Decodes the envelope payload and persists it when present.
    pub async fn store_payload(
        &self,
        report_id: &str,
        envelope: &Envelope,
    ) -> Result<Option<Vec<u8>>, IngestError> {
        let Some(bytes) = decode_payload(envelope)? else {
            return Ok(None);
        };
        self.save(report_id, &bytes).await?;
        Ok(Some(bytes))
    }
}

fn artifact_error(path: &Path, err: std::io::Error) -> IngestError {
    IngestError::Artifact {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(body: &str) -> Envelope {
        Envelope::parse(&format!(
            r#"<get_report_response status="200" status_text="OK">{body}</get_report_response>"#
        ))
        .unwrap()
    }

    #[test]
    fn decodes_marker_tail() {
        let env = envelope(
            r#"<report id="r-1" format_id="f"><report_format id="f"><name>CSV Results</name></report_format>SGVsbG8=</report>"#,
        );
        assert_eq!(decode_payload(&env).unwrap(), Some(b"Hello".to_vec()));
    }

    #[test]
    fn tolerates_wrapped_base64() {
        let env = envelope("<report><report_format/>\n  SGVs\n  bG8=\n</report>");
        assert_eq!(decode_payload(&env).unwrap(), Some(b"Hello".to_vec()));
    }

    #[test]
    fn missing_marker_is_no_payload() {
        let env = envelope(r#"<report id="r-1"><name>x</name></report>"#);
        assert_eq!(decode_payload(&env).unwrap(), None);
    }

    #[test]
    fn empty_tail_is_no_payload() {
        let env = envelope("<report><report_format><name>CSV</name></report_format>   </report>");
        assert_eq!(decode_payload(&env).unwrap(), None);
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        let env = envelope("<report><report_format/>not*base64!</report>");
        assert!(matches!(decode_payload(&env), Err(IngestError::Decode(_))));
    }

    #[tokio::test]
    async fn save_creates_directory_and_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("nested/data"));
        let path = store.save("r-1", b"a,b\n1,2\n").await.unwrap();
        assert_eq!(path, tmp.path().join("nested/data/r-1.csv"));
        assert_eq!(store.read("r-1").await.unwrap(), b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn store_payload_without_marker_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("data"));
        let env = envelope("<report><name>x</name></report>");
        assert_eq!(store.store_payload("r-1", &env).await.unwrap(), None);
        assert!(!tmp.path().join("data").exists());
    }

    #[test]
    fn unsafe_id_is_rejected() {
        let store = ArtifactStore::new("data");
        assert!(store.path_for("../etc/passwd").is_err());
    }
}
