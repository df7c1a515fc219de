//! In-memory queue and object store used by the integration tests

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use batch_common::checksum::sha256_hex;
use batch_worker::{
    pipeline::RecordPipeline,
    poller::Poller,
    processor::MessageProcessor,
    queue::{MessageQueue, QueueMessage, ReceiveOptions},
    storage::{ObjectStore, UploadResult},
    transform::{Identity, Transform},
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,batch_worker=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn notification(key: &str) -> String {
    format!(r#"{{"Records":[{{"s3":{{"object":{{"key":"{}"}}}}}}]}}"#, key)
}

pub fn message(id: &str, body: impl Into<String>) -> QueueMessage {
    QueueMessage {
        message_id: id.to_string(),
        body: body.into(),
        receipt_handle: format!("receipt-{}", id),
        receive_count: Some(1),
    }
}

// ============================================================================
// Queue
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCall {
    Delete(String),
    ChangeVisibility(String, i32),
}

/// Hands out pre-loaded batches and records every acknowledgement
#[derive(Default)]
pub struct FakeQueue {
    batches: Mutex<VecDeque<Result<Vec<QueueMessage>, String>>>,
    calls: Mutex<Vec<QueueCall>>,
    receives: Mutex<Vec<ReceiveOptions>>,
    fail_deletes: bool,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn push_batch(&self, messages: Vec<QueueMessage>) {
        self.batches.lock().unwrap().push_back(Ok(messages));
    }

    pub fn push_receive_error(&self, error: &str) {
        self.batches.lock().unwrap().push_back(Err(error.to_string()));
    }

    pub fn calls(&self) -> Vec<QueueCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                QueueCall::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn visibility_changes(&self) -> Vec<(String, i32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                QueueCall::ChangeVisibility(id, secs) => Some((id, secs)),
                _ => None,
            })
            .collect()
    }

    pub fn receives(&self) -> Vec<ReceiveOptions> {
        self.receives.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageQueue for FakeQueue {
    async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<QueueMessage>> {
        self.receives.lock().unwrap().push(*options);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(Ok(messages)) => Ok(messages),
            Some(Err(e)) => Err(anyhow!(e)),
            None => {
                // Behave like an idle long poll without slowing the tests
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(Vec::new())
            },
        }
    }

    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(QueueCall::Delete(message.message_id.clone()));
        if self.fail_deletes {
            bail!("delete rejected for {}", message.message_id);
        }
        Ok(())
    }

    async fn change_visibility(&self, message: &QueueMessage, timeout_secs: i32) -> Result<()> {
        self.calls.lock().unwrap().push(QueueCall::ChangeVisibility(
            message.message_id.clone(),
            timeout_secs,
        ));
        Ok(())
    }
}

// ============================================================================
// Object store
// ============================================================================

/// Bucket held in memory with switchable failures
#[derive(Default)]
pub struct FakeStore {
    name: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    failing_downloads: Mutex<HashSet<String>>,
    fail_uploads: Mutex<bool>,
    block_cleanup: Mutex<bool>,
}

impl FakeStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn put(&self, key: &str, content: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn fail_download_of(&self, key: &str) {
        self.failing_downloads.lock().unwrap().insert(key.to_string());
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        *self.fail_uploads.lock().unwrap() = fail;
    }

    /// After each successful file upload, swap the local file for a
    /// non-empty directory so the caller cannot delete it
    pub fn set_block_cleanup(&self, block: bool) {
        *self.block_cleanup.lock().unwrap() = block;
    }

    /// Every upload attempt in order, including rejected ones
    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    fn bucket(&self) -> &str {
        &self.name
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        if self.failing_downloads.lock().unwrap().contains(key) {
            bail!("injected download failure for {}", key);
        }
        self.get(key)
            .ok_or_else(|| anyhow!("NoSuchKey: {}/{}", self.name, key))
    }

    async fn upload(&self, key: &str, data: Vec<u8>, _content_type: Option<&str>) -> Result<UploadResult> {
        self.uploads
            .lock()
            .unwrap()
            .push((key.to_string(), data.clone()));

        if *self.fail_uploads.lock().unwrap() {
            bail!("injected upload failure for {}", key);
        }

        let result = UploadResult {
            key: key.to_string(),
            checksum: sha256_hex(&data),
            size: data.len() as i64,
        };
        self.put(key, data);
        Ok(result)
    }

    async fn upload_file(&self, key: &str, path: &Path, content_type: Option<&str>) -> Result<UploadResult> {
        let data = tokio::fs::read(path).await?;
        let result = self.upload(key, data, content_type).await?;

        if *self.block_cleanup.lock().unwrap() {
            std::fs::remove_file(path)?;
            std::fs::create_dir(path)?;
            std::fs::write(path.join("held"), b"x")?;
        }

        Ok(result)
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub const OUTPUT_PREFIX: &str = "output/";

pub const RECEIVE_OPTIONS: ReceiveOptions = ReceiveOptions {
    max_messages: 10,
    wait_time_secs: 20,
    visibility_timeout_secs: 120,
};

/// A processor over fake stores and a private working directory
pub struct Harness {
    pub input: Arc<FakeStore>,
    pub output: Arc<FakeStore>,
    pub queue: Arc<FakeQueue>,
    pub work_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_queue(FakeQueue::new())
    }

    pub fn with_queue(queue: FakeQueue) -> Self {
        init_tracing();
        Self {
            input: Arc::new(FakeStore::new("input-bucket")),
            output: Arc::new(FakeStore::new("output-bucket")),
            queue: Arc::new(queue),
            work_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn processor(&self) -> MessageProcessor {
        self.processor_with(Arc::new(Identity))
    }

    pub fn processor_with(&self, transform: Arc<dyn Transform>) -> MessageProcessor {
        let pipeline = RecordPipeline::new(self.input.clone(), transform, self.work_dir.path());
        MessageProcessor::new(pipeline, self.output.clone(), OUTPUT_PREFIX)
    }

    pub fn poller(&self) -> Poller {
        Poller::new(self.queue.clone(), self.processor(), RECEIVE_OPTIONS)
            .with_error_backoff(Duration::from_millis(10))
    }

    /// Files currently in the working directory
    pub fn work_files(&self) -> Vec<String> {
        list_dir(self.work_dir.path())
    }
}

pub fn list_dir(path: &Path) -> Vec<String> {
    std::fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}
