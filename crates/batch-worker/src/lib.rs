//! Batch Worker Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! A long-running queue consumer: each message names a newline-delimited
//! JSON object in the input bucket; the worker transforms every record,
//! uploads the result as one JSON array to the output bucket, and deletes the
//! message only once that upload succeeded.
//!
//! # Delivery contract
//!
//! Messages are processed at least once. Any failure (bad notification,
//! unreadable object, invalid line, failed upload, local file trouble) makes
//! the message visible again immediately; the queue's redrive policy decides
//! when to give up and dead-letter it. Reprocessing is safe because the
//! [`transform::Transform`] is pure and results are written by full overwrite
//! under a key derived from the source object's base name.
//!
//! # Components
//!
//! - [`poller::Poller`]: receive loop, acknowledgement, shutdown
//! - [`processor::MessageProcessor`]: one attempt for one message
//! - [`pipeline::RecordPipeline`]: download, transform, write result file
//! - [`queue::MessageQueue`] / [`storage::ObjectStore`]: service seams, with
//!   SQS and S3 implementations
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use batch_worker::{
//!     config::WorkerConfig, pipeline::RecordPipeline, poller::Poller,
//!     processor::MessageProcessor, queue::sqs::SqsQueue, storage::Storage,
//!     transform::Identity,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WorkerConfig::from_env()?;
//!     let input = Arc::new(Storage::new(config.input_storage()).await?);
//!     let output = Arc::new(Storage::new(config.output_storage()).await?);
//!     let queue = Arc::new(SqsQueue::new(config.queue()).await?);
//!
//!     let pipeline = RecordPipeline::new(input, Arc::new(Identity), &config.work_dir);
//!     let processor = MessageProcessor::new(pipeline, output, &config.output_prefix);
//!     Poller::new(queue, processor, config.receive_options())
//!         .run(CancellationToken::new())
//!         .await;
//!     Ok(())
//! }
//! ```

pub mod aws;
pub mod config;
pub mod error;
pub mod notification;
pub mod pipeline;
pub mod poller;
pub mod processor;
pub mod queue;
pub mod storage;
pub mod transform;

// Re-export commonly used types
pub use error::{FailureKind, ProcessingError};
pub use processor::ProcessingOutcome;
