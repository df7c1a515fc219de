//! Message processor: one queue message, one attempt
//!
//! `Received -> Processing -> {Succeeded, Failed}`. The processor performs the
//! work and reports the outcome; acknowledging the message (delete on
//! success, immediate redelivery on failure) is the poll loop's job. Nothing
//! is retried here: a failed attempt goes back to the queue, whose redrive
//! policy bounds the number of attempts.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, field, info, instrument, warn, Span};
use uuid::Uuid;

use crate::error::ProcessingError;
use crate::notification::FileNotification;
use crate::pipeline::RecordPipeline;
use crate::queue::QueueMessage;
use crate::storage::ObjectStore;

const RESULT_CONTENT_TYPE: &str = "application/json";

/// Result of one processing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Result uploaded; the message can be deleted
    Succeeded {
        output_key: String,
        records: usize,
        checksum: String,
    },
    /// Attempt abandoned; the message should be redelivered
    Failed(ProcessingError),
}

impl ProcessingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingOutcome::Succeeded { .. })
    }
}

pub struct MessageProcessor {
    pipeline: RecordPipeline,
    output: Arc<dyn ObjectStore>,
    output_prefix: String,
}

impl MessageProcessor {
    pub fn new(
        pipeline: RecordPipeline,
        output: Arc<dyn ObjectStore>,
        output_prefix: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            output,
            output_prefix: output_prefix.into(),
        }
    }

    /// Output key for a source object's base name. Same name, same key:
    /// reprocessing overwrites the previous result.
    pub fn output_key(&self, base_name: &str) -> String {
        format!("{}{}", self.output_prefix, base_name)
    }

    /// Run one attempt. Never panics on bad input and never returns early
    /// with a working file left behind.
    #[instrument(
        name = "process_message",
        skip_all,
        fields(
            message_id = %message.message_id,
            receive_count = ?message.receive_count,
            object_key = field::Empty,
        )
    )]
    pub async fn process(&self, message: &QueueMessage) -> ProcessingOutcome {
        let started = Instant::now();

        match self.attempt(message).await {
            Ok(done) => {
                info!(
                    output_key = %done.output_key,
                    records = done.records,
                    checksum = %done.checksum,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Message processed"
                );
                ProcessingOutcome::Succeeded {
                    output_key: done.output_key,
                    records: done.records,
                    checksum: done.checksum,
                }
            },
            Err(e) => {
                error!(
                    kind = %e.kind,
                    detail = %e.detail,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Message processing failed"
                );
                ProcessingOutcome::Failed(e)
            },
        }
    }

    async fn attempt(&self, message: &QueueMessage) -> Result<Uploaded, ProcessingError> {
        let notification = FileNotification::parse(&message.body)?;
        let key = notification.object_key();
        Span::current().record("object_key", key);

        let base_name = notification.base_name()?;

        // Each attempt writes into its own scratch directory, so two messages
        // naming objects with the same base name never share a working file.
        let attempt_id = Uuid::new_v4().to_string();
        let artifact = self.pipeline.run(key, &attempt_id, base_name).await?;

        let output_key = self.output_key(base_name);
        let upload = self
            .output
            .upload_file(&output_key, &artifact.path, Some(RESULT_CONTENT_TYPE))
            .await;

        let cleanup = artifact.remove().await;

        let upload = upload.map_err(|e| ProcessingError::upload(&e));
        match (upload, cleanup) {
            (Err(upload_err), Err(cleanup_err)) => {
                warn!(path = %artifact.path.display(), error = %cleanup_err, "Failed to remove result file");
                Err(upload_err)
            },
            (Err(upload_err), Ok(())) => Err(upload_err),
            (Ok(_), Err(cleanup_err)) => Err(ProcessingError::local_fs(
                &format!("failed to remove {}", artifact.path.display()),
                &cleanup_err,
            )),
            (Ok(uploaded), Ok(())) => Ok(Uploaded {
                output_key: uploaded.key,
                records: artifact.records,
                checksum: artifact.checksum,
            }),
        }
    }
}

/// What a successful attempt produced
struct Uploaded {
    output_key: String,
    records: usize,
    checksum: String,
}
