//! Poll loop
//!
//! Receives batches from the queue and hands each message to the
//! [`MessageProcessor`] one at a time, then acknowledges it according to the
//! outcome. Runs until its cancellation token fires.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::processor::{MessageProcessor, ProcessingOutcome};
use crate::queue::{MessageQueue, QueueMessage, ReceiveOptions};

/// Pause after a failed receive call before trying again.
pub const DEFAULT_RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Visibility timeout that makes a message immediately redeliverable.
const REDELIVER_NOW: i32 = 0;

/// What happened to one received batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Returned to the queue unprocessed because shutdown was requested
    pub released: usize,
}

pub struct Poller {
    queue: Arc<dyn MessageQueue>,
    processor: MessageProcessor,
    options: ReceiveOptions,
    error_backoff: Duration,
}

impl Poller {
    pub fn new(queue: Arc<dyn MessageQueue>, processor: MessageProcessor, options: ReceiveOptions) -> Self {
        Self {
            queue,
            processor,
            options,
            error_backoff: DEFAULT_RECEIVE_ERROR_BACKOFF,
        }
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Receive and process a single batch.
    ///
    /// A receive failure is returned; failures of individual messages are
    /// not, they only show up in the summary.
    pub async fn poll_once(&self) -> Result<BatchSummary> {
        let messages = self.queue.receive(&self.options).await?;
        Ok(self.handle_batch(messages, &CancellationToken::new()).await)
    }

    /// Poll until `cancel` fires.
    ///
    /// Cancellation interrupts a long-poll wait or an error back-off at once.
    /// Inside a batch it is checked between messages: the message being
    /// processed finishes, the rest are made visible again.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            batch_size = self.options.max_messages,
            wait_time_secs = self.options.wait_time_secs,
            visibility_timeout_secs = self.options.visibility_timeout_secs,
            "Poll loop started"
        );

        loop {
            // Dropping an in-flight receive is safe: anything the service
            // already handed out reappears after its visibility timeout.
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = self.queue.receive(&self.options) => received,
            };

            match received {
                Ok(messages) => {
                    self.handle_batch(messages, &cancel).await;
                },
                Err(e) => {
                    error!(
                        error = %format!("{:#}", e),
                        backoff_secs = self.error_backoff.as_secs_f64(),
                        "Failed to receive messages"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {},
                    }
                },
            }
        }

        info!("Poll loop stopped");
    }

    async fn handle_batch(&self, messages: Vec<QueueMessage>, cancel: &CancellationToken) -> BatchSummary {
        let mut summary = BatchSummary {
            received: messages.len(),
            ..BatchSummary::default()
        };

        if messages.is_empty() {
            debug!("No messages received");
            return summary;
        }

        debug!(count = messages.len(), "Processing batch");

        for message in messages {
            if cancel.is_cancelled() {
                self.release(&message).await;
                summary.released += 1;
                continue;
            }

            let outcome = self.processor.process(&message).await;
            if outcome.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }

            self.acknowledge(&message, &outcome).await;
        }

        info!(
            received = summary.received,
            succeeded = summary.succeeded,
            failed = summary.failed,
            released = summary.released,
            "Batch complete"
        );

        summary
    }

    async fn acknowledge(&self, message: &QueueMessage, outcome: &ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::Succeeded { .. } => {
                debug!(message_id = %message.message_id, "Deleting message");
                if let Err(e) = self.queue.delete(message).await {
                    // The result is already uploaded; redelivery will just
                    // overwrite it with the same content.
                    error!(
                        message_id = %message.message_id,
                        error = %format!("{:#}", e),
                        "Failed to delete processed message, it will be redelivered"
                    );
                }
            },
            ProcessingOutcome::Failed(_) => self.release(message).await,
        }
    }

    /// Make the message visible to consumers again right away
    async fn release(&self, message: &QueueMessage) {
        if let Err(e) = self.queue.change_visibility(message, REDELIVER_NOW).await {
            warn!(
                message_id = %message.message_id,
                error = %format!("{:#}", e),
                visibility_timeout_secs = self.options.visibility_timeout_secs,
                "Failed to reset visibility, message returns after its timeout"
            );
        }
    }
}
