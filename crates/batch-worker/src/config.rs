//! Worker configuration
//!
//! Everything comes from the process environment (optionally seeded from a
//! `.env` file). The four deployment variables are required; a worker that
//! starts without them would poll forever without doing anything useful, so
//! their absence is a startup error.

use batch_common::{BatchError, Result};
use std::path::PathBuf;
use std::str::FromStr;

use crate::queue::{sqs::SqsConfig, ReceiveOptions};
use crate::storage::config::{StaticCredentials, StorageConfig};

// ============================================================================
// Environment variable names
// ============================================================================

pub const ENV_INPUT_BUCKET: &str = "s3InputBucket";
pub const ENV_OUTPUT_BUCKET: &str = "s3OutputBucket";
pub const ENV_QUEUE_NAME: &str = "SQSBatchQueue";
pub const ENV_REGION: &str = "AWSRegion";

// ============================================================================
// Defaults
// ============================================================================

/// Messages requested per receive call (the queue's upper bound).
pub const DEFAULT_BATCH_SIZE: i32 = 10;

/// Long-poll wait; the queue service caps this at 20 seconds.
pub const DEFAULT_WAIT_TIME_SECS: i32 = 20;

/// How long a received message stays hidden while it is processed.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: i32 = 120;

pub const DEFAULT_WORK_DIR: &str = "output/";
pub const DEFAULT_OUTPUT_PREFIX: &str = "output/";

const MAX_BATCH_SIZE: i32 = 10;
const MAX_WAIT_TIME_SECS: i32 = 20;
/// 12 hours, the queue service maximum
const MAX_VISIBILITY_TIMEOUT_SECS: i32 = 43_200;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub input_bucket: String,
    pub output_bucket: String,
    pub queue_name: String,
    pub region: String,

    /// Directory holding transient result files
    pub work_dir: PathBuf,

    /// Key prefix for uploaded results, prepended to the source base name
    pub output_prefix: String,

    pub s3_endpoint: Option<String>,
    pub s3_path_style: bool,
    pub sqs_endpoint: Option<String>,

    /// Static credentials; `None` uses the default provider chain
    pub credentials: Option<StaticCredentials>,

    pub batch_size: i32,
    pub wait_time_secs: i32,
    pub visibility_timeout_secs: i32,
}

impl WorkerConfig {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| BatchError::missing_var(name))
        };

        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let credentials = match (non_empty("AWS_ACCESS_KEY_ID"), non_empty("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key), Some(secret_key)) => Some(StaticCredentials {
                access_key,
                secret_key,
                session_token: non_empty("AWS_SESSION_TOKEN"),
            }),
            _ => None,
        };

        let config = Self {
            input_bucket: required(ENV_INPUT_BUCKET)?,
            output_bucket: required(ENV_OUTPUT_BUCKET)?,
            queue_name: required(ENV_QUEUE_NAME)?,
            region: required(ENV_REGION)?,
            work_dir: non_empty("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR)),
            output_prefix: lookup("OUTPUT_PREFIX")
                .unwrap_or_else(|| DEFAULT_OUTPUT_PREFIX.to_string()),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            s3_path_style: parse_or(&lookup, "S3_PATH_STYLE", false)?,
            sqs_endpoint: non_empty("SQS_ENDPOINT"),
            credentials,
            batch_size: parse_or(&lookup, "POLL_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            wait_time_secs: parse_or(&lookup, "POLL_WAIT_TIME_SECS", DEFAULT_WAIT_TIME_SECS)?,
            visibility_timeout_secs: parse_or(
                &lookup,
                "POLL_VISIBILITY_TIMEOUT_SECS",
                DEFAULT_VISIBILITY_TIMEOUT_SECS,
            )?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(BatchError::Config(format!(
                "POLL_BATCH_SIZE must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }

        if !(0..=MAX_WAIT_TIME_SECS).contains(&self.wait_time_secs) {
            return Err(BatchError::Config(format!(
                "POLL_WAIT_TIME_SECS must be between 0 and {}, got {}",
                MAX_WAIT_TIME_SECS, self.wait_time_secs
            )));
        }

        if !(0..=MAX_VISIBILITY_TIMEOUT_SECS).contains(&self.visibility_timeout_secs) {
            return Err(BatchError::Config(format!(
                "POLL_VISIBILITY_TIMEOUT_SECS must be between 0 and {}, got {}",
                MAX_VISIBILITY_TIMEOUT_SECS, self.visibility_timeout_secs
            )));
        }

        if self.visibility_timeout_secs == 0 {
            tracing::warn!("Visibility timeout is 0 - other consumers can receive in-flight messages");
        }

        Ok(())
    }

    /// Create the working directory (and parents) if it does not exist yet
    pub fn prepare_work_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        Ok(())
    }

    pub fn input_storage(&self) -> StorageConfig {
        self.storage_for(&self.input_bucket)
    }

    pub fn output_storage(&self) -> StorageConfig {
        self.storage_for(&self.output_bucket)
    }

    fn storage_for(&self, bucket: &str) -> StorageConfig {
        StorageConfig {
            endpoint: self.s3_endpoint.clone(),
            region: self.region.clone(),
            bucket: bucket.to_string(),
            credentials: self.credentials.clone(),
            path_style: self.s3_path_style,
        }
    }

    pub fn queue(&self) -> SqsConfig {
        SqsConfig {
            endpoint: self.sqs_endpoint.clone(),
            region: self.region.clone(),
            queue_name: self.queue_name.clone(),
            credentials: self.credentials.clone(),
        }
    }

    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            max_messages: self.batch_size,
            wait_time_secs: self.wait_time_secs,
            visibility_timeout_secs: self.visibility_timeout_secs,
        }
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| BatchError::invalid_var(name, &raw, e)),
        _ => Ok(default),
    }
}
