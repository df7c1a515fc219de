//! Message queue access
//!
//! The queue owns delivery state: visibility, redelivery counting and
//! dead-lettering all live in the service. The worker only ever receives,
//! deletes, or changes the visibility of a message it holds.

use anyhow::Result;
use async_trait::async_trait;

pub mod sqs;

/// One received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    /// Handle for this particular receipt; needed to delete or re-show it
    pub receipt_handle: String,
    /// Delivery attempt reported by the service, informational only
    pub receive_count: Option<u32>,
}

/// Parameters for one receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    pub max_messages: i32,
    /// Long-poll duration while the queue is empty
    pub wait_time_secs: i32,
    /// How long received messages stay hidden from other consumers
    pub visibility_timeout_secs: i32,
}

/// At-least-once message source with per-message visibility
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Receive up to `options.max_messages` messages. An empty batch means
    /// the wait elapsed with nothing to do.
    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<QueueMessage>>;

    /// Acknowledge: remove the message from the queue for good
    async fn delete(&self, message: &QueueMessage) -> Result<()>;

    /// Set the remaining visibility timeout; `0` makes it redeliverable now
    async fn change_visibility(&self, message: &QueueMessage, timeout_secs: i32) -> Result<()>;
}
