//! Per-message failure taxonomy
//!
//! Every error raised while handling one queue message is converted into a
//! [`ProcessingError`]. None of them are fatal to the worker: the poll loop
//! logs the failure and makes the message visible again.

use thiserror::Error;

/// Which step of message handling failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Message body is not an object-created notification
    MalformedNotification,
    /// Object store read failed
    Retrieval,
    /// A line of the object is not valid JSON
    Parse,
    /// Object store write failed
    Upload,
    /// Working file could not be written
    LocalFilesystem,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MalformedNotification => "malformed_notification",
            FailureKind::Retrieval => "retrieval",
            FailureKind::Parse => "parse",
            FailureKind::Upload => "upload",
            FailureKind::LocalFilesystem => "local_filesystem",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed processing attempt for one message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} failure: {detail}")]
pub struct ProcessingError {
    pub kind: FailureKind,
    pub detail: String,
}

impl ProcessingError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedNotification, detail)
    }

    /// Wrap a client error, keeping the whole `anyhow` context chain
    pub fn retrieval(err: &anyhow::Error) -> Self {
        Self::new(FailureKind::Retrieval, format!("{:#}", err))
    }

    pub fn upload(err: &anyhow::Error) -> Self {
        Self::new(FailureKind::Upload, format!("{:#}", err))
    }

    pub fn local_fs(context: &str, err: &std::io::Error) -> Self {
        Self::new(FailureKind::LocalFilesystem, format!("{}: {}", context, err))
    }

    pub fn parse(line: usize, err: &serde_json::Error) -> Self {
        Self::new(FailureKind::Parse, format!("line {}: {}", line, err))
    }

    /// The result array could not be rendered into the working file
    pub fn artifact(err: &serde_json::Error) -> Self {
        Self::new(
            FailureKind::LocalFilesystem,
            format!("failed to serialize results: {}", err),
        )
    }
}
