use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fastx_upload::{
    Config, UploadOutcome, Uploader,
    client::{ApiClient, HttpTransport},
    config::{Command, parse_inputs},
    fastx::ProgressFn,
    storage::S3ObjectStore,
};

/// Log processed bytes per file every this many bytes
const PROGRESS_STEP: u64 = 256 * 1024 * 1024;

fn progress_logger() -> ProgressFn {
    let logged: Mutex<HashMap<String, u64>> = Mutex::new(HashMap::new());
    Arc::new(move |name: &str, processed: u64| {
        let Ok(mut logged) = logged.lock() else {
            return;
        };
        let last = logged.entry(name.to_string()).or_insert(0);
        if processed >= *last + PROGRESS_STEP {
            *last = processed;
            tracing::info!("{}: {} MiB processed", name, processed / (1024 * 1024));
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = Arc::new(ApiClient::new(&config.api_url, config.api_key.clone())?);

    match &config.command {
        Command::Upload { files, .. } => {
            let inputs = parse_inputs(files)?;
            let options = config.upload_options();

            let transport = Arc::new(HttpTransport::new()?);
            let store = Arc::new(S3ObjectStore::new(
                config.s3_region.clone(),
                config.s3_endpoint.clone(),
            ));
            tracing::info!(
                "Uploading {} inputs to {} ({} at a time)",
                inputs.len(),
                config.api_url,
                options.concurrency
            );

            let uploader =
                Uploader::new(client, transport, store, options)?.with_progress(progress_logger());

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, finishing uploads in flight");
                    on_signal.cancel();
                }
            });

            let outcomes = uploader.upload_with_cancel(inputs, &cancel).await;

            let mut failed = 0;
            for (file, outcome) in files.iter().zip(&outcomes) {
                match outcome {
                    UploadOutcome::Success { sample_id } => println!("{}\t{}", file, sample_id),
                    UploadOutcome::Failure { kind, message } => {
                        failed += 1;
                        tracing::error!("{}: {:?}: {}", file, kind, message);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} uploads failed", failed, outcomes.len());
            }
        }
        Command::Download { sample_id, output } => {
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{}.fastx", sample_id)));
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            client.download(sample_id, &path).await?;
        }
    }

    Ok(())
}
