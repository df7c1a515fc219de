//! Batch Worker - queue-driven object transformation

use anyhow::{Context, Result};
use batch_common::logging::{init_logging, LogConfig, LogLevel};
use batch_worker::{
    config::WorkerConfig,
    pipeline::RecordPipeline,
    poller::Poller,
    processor::MessageProcessor,
    queue::sqs::SqsQueue,
    storage::Storage,
    transform::Identity,
};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "batch-worker")]
#[command(author, version, about = "Transforms newly arrived objects announced on a queue")]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Process a single batch and exit
    #[arg(long)]
    once: bool,

    /// Directory for transient result files (overrides WORK_DIR)
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("batch-worker")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,hyper=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting batch worker");

    // Missing configuration is fatal: stop before touching the queue
    let mut config = WorkerConfig::from_env()?;
    if let Some(work_dir) = cli.work_dir {
        config.work_dir = work_dir;
    }

    info!(
        input_bucket = %config.input_bucket,
        output_bucket = %config.output_bucket,
        queue = %config.queue_name,
        region = %config.region,
        "Configuration loaded"
    );

    config
        .prepare_work_dir()
        .with_context(|| format!("Failed to create work directory {}", config.work_dir.display()))?;

    let queue = Arc::new(SqsQueue::new(config.queue()).await?);
    let input = Arc::new(Storage::new(config.input_storage()).await?);
    let output = Arc::new(Storage::new(config.output_storage()).await?);

    let pipeline = RecordPipeline::new(input, Arc::new(Identity), &config.work_dir);
    let processor = MessageProcessor::new(pipeline, output, &config.output_prefix);
    let poller = Poller::new(queue, processor, config.receive_options());

    if cli.once {
        let summary = poller.poll_once().await?;
        info!(
            received = summary.received,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Single batch processed"
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    poller.run(cancel).await;

    info!("Batch worker shut down gracefully");

    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing current message");
        },
        _ = terminate => {
            info!("Received terminate signal, finishing current message");
        },
    }

    token.cancel();
}
