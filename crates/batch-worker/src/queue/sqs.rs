//! SQS-backed [`MessageQueue`]

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_sqs::{types::MessageSystemAttributeName, Client};
use tracing::{debug, info, instrument, warn};

use super::{MessageQueue, QueueMessage, ReceiveOptions};
use crate::aws::load_sdk_config;
use crate::storage::config::StaticCredentials;

#[derive(Debug, Clone)]
pub struct SqsConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub queue_name: String,
    pub credentials: Option<StaticCredentials>,
}

#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    /// Connect and resolve the queue URL from its name.
    ///
    /// Fails if the queue does not exist; the worker treats that as a
    /// startup error.
    pub async fn new(config: SqsConfig) -> Result<Self> {
        debug!("Initializing queue with config: {:?}", config);

        let sdk_config = load_sdk_config(&config.region, config.credentials.as_ref()).await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let client = Client::from_conf(builder.build());

        let queue_url = client
            .get_queue_url()
            .queue_name(&config.queue_name)
            .send()
            .await
            .with_context(|| format!("Failed to resolve queue {}", config.queue_name))?
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Queue {} has no URL", config.queue_name))?;

        info!(queue = %config.queue_name, url = %queue_url, "Queue client initialized");

        Ok(Self { client, queue_url })
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    #[instrument(skip(self))]
    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<QueueMessage>> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(options.max_messages)
            .wait_time_seconds(options.wait_time_secs)
            .visibility_timeout(options.visibility_timeout_secs)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .context("Failed to receive messages")?;

        let mut messages = Vec::new();
        for message in response.messages() {
            let Some(receipt_handle) = message.receipt_handle() else {
                // Without a handle it can be neither deleted nor re-shown;
                // the visibility timeout will return it to the queue.
                warn!(message_id = ?message.message_id(), "Received message without receipt handle, skipping");
                continue;
            };

            let receive_count = message
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|count| count.parse().ok());

            messages.push(QueueMessage {
                message_id: message.message_id().unwrap_or_default().to_string(),
                body: message.body().unwrap_or_default().to_string(),
                receipt_handle: receipt_handle.to_string(),
                receive_count,
            });
        }

        debug!("Received {} messages", messages.len());

        Ok(messages)
    }

    #[instrument(skip(self, message), fields(message_id = %message.message_id))]
    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .with_context(|| format!("Failed to delete message {}", message.message_id))?;

        Ok(())
    }

    #[instrument(skip(self, message), fields(message_id = %message.message_id))]
    async fn change_visibility(&self, message: &QueueMessage, timeout_secs: i32) -> Result<()> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(&message.receipt_handle)
            .visibility_timeout(timeout_secs)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to set visibility of message {} to {}s",
                    message.message_id, timeout_secs
                )
            })?;

        Ok(())
    }
}
