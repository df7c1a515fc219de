//! Record pipeline: one input object in, one local result file out
//!
//! The object is newline-delimited JSON. Each line is parsed, passed through
//! the [`Transform`], and collected in input order; the whole sequence is
//! written as a single JSON array. A single unparsable line fails the entire
//! object, so a redelivered message always starts again from a clean slate.

use batch_common::checksum::sha256_hex;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::ProcessingError;
use crate::storage::ObjectStore;
use crate::transform::Transform;

/// Parse and transform every line of `text`, preserving order.
///
/// Line numbers in errors are 1-based. A trailing newline does not produce an
/// extra record, but a blank line in the middle is invalid.
pub fn transform_lines(text: &str, transform: &dyn Transform) -> Result<Vec<Value>, ProcessingError> {
    text.lines()
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str::<Value>(line)
                .map(|record| transform.apply(record))
                .map_err(|e| ProcessingError::parse(index + 1, &e))
        })
        .collect()
}

/// A result file owned by one processing attempt.
///
/// The file sits in a scratch directory private to the attempt, so its name
/// is exactly the source base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    /// `<work_dir>/<attempt_id>`
    pub scratch_dir: PathBuf,
    /// `<scratch_dir>/<base_name>`
    pub path: PathBuf,
    pub records: usize,
    /// Hex SHA-256 of the file content
    pub checksum: String,
}

impl LocalArtifact {
    /// Delete the file and its scratch directory. Already gone counts as
    /// success; both removals are attempted and the first error is returned.
    pub async fn remove(&self) -> std::io::Result<()> {
        let file = ignore_missing(tokio::fs::remove_file(&self.path).await);
        let dir = ignore_missing(tokio::fs::remove_dir(&self.scratch_dir).await);
        file.and(dir)
    }
}

fn ignore_missing(result: std::io::Result<()>) -> std::io::Result<()> {
    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

pub struct RecordPipeline {
    input: Arc<dyn ObjectStore>,
    transform: Arc<dyn Transform>,
    work_dir: PathBuf,
}

impl RecordPipeline {
    pub fn new(
        input: Arc<dyn ObjectStore>,
        transform: Arc<dyn Transform>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input,
            transform,
            work_dir: work_dir.into(),
        }
    }

    /// Fetch `key`, transform it, and write the result to
    /// `<work_dir>/<attempt_id>/<base_name>`.
    #[instrument(skip(self), fields(bucket = %self.input.bucket()))]
    pub async fn run(
        &self,
        key: &str,
        attempt_id: &str,
        base_name: &str,
    ) -> Result<LocalArtifact, ProcessingError> {
        let text = self
            .input
            .download_text(key)
            .await
            .map_err(|e| ProcessingError::retrieval(&e))?;

        let records = transform_lines(&text, self.transform.as_ref())?;
        debug!(records = records.len(), "Transformed object");

        let body = serde_json::to_vec(&records).map_err(|e| ProcessingError::artifact(&e))?;

        let scratch_dir = self.work_dir.join(attempt_id);
        tokio::fs::create_dir(&scratch_dir).await.map_err(|e| {
            ProcessingError::local_fs(&format!("failed to create {}", scratch_dir.display()), &e)
        })?;

        let artifact = LocalArtifact {
            path: scratch_dir.join(base_name),
            scratch_dir,
            records: records.len(),
            checksum: sha256_hex(&body),
        };
        debug!(path = %artifact.path.display(), "Writing result file");

        if let Err(e) = tokio::fs::write(&artifact.path, &body).await {
            // A partial file must not outlive the attempt
            if let Err(cleanup) = artifact.remove().await {
                warn!(
                    path = %artifact.path.display(),
                    error = %cleanup,
                    "Failed to remove partial result file"
                );
            }
            return Err(ProcessingError::local_fs(
                &format!("failed to write {}", artifact.path.display()),
                &e,
            ));
        }

        Ok(artifact)
    }
}
