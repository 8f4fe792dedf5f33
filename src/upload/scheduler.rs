use super::body::open_body;
use super::naming::upload_filename;
use super::{MultipartUpload, Router, SimpleUpload, Transfer, UploadJob, UploadRoute};
use crate::client::{ControlPlane, UploadTransport};
use crate::config::UploadOptions;
use crate::fastx::ProgressFn;
use crate::storage::ObjectStore;
use crate::types::{LogicalInput, UploadOutcome};
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs many uploads with bounded concurrency.
///
/// Every input gets exactly one [`UploadOutcome`]; a failing input never
/// stops the others.
pub struct Uploader {
    simple: Arc<dyn Transfer>,
    chunked: Arc<dyn Transfer>,
    router: Router,
    options: UploadOptions,
    progress: Option<ProgressFn>,
}

impl Uploader {
    pub fn new(
        control: Arc<dyn ControlPlane>,
        transport: Arc<dyn UploadTransport>,
        store: Arc<dyn ObjectStore>,
        options: UploadOptions,
    ) -> Result<Self> {
        let simple = Arc::new(SimpleUpload::new(Arc::clone(&control), transport));
        let chunked = Arc::new(MultipartUpload::new(control, store, options.chunk_size)?);
        Self::with_strategies(simple, chunked, options)
    }

    /// Build an uploader around custom transfer strategies.
    ///
    /// Fails with [`Error::InvalidInput`] when `options` do not pass
    /// [`UploadOptions::check`].
    pub fn with_strategies(
        simple: Arc<dyn Transfer>,
        chunked: Arc<dyn Transfer>,
        options: UploadOptions,
    ) -> Result<Self> {
        options.check()?;
        Ok(Self {
            simple,
            chunked,
            router: Router::new(options.multipart_threshold),
            options,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Upload all inputs; outcomes come back in input order.
    pub async fn upload(&self, inputs: Vec<LogicalInput>) -> Vec<UploadOutcome> {
        self.upload_with_cancel(inputs, &CancellationToken::new())
            .await
    }

    /// Like [`upload`](Self::upload), but stops dispatching once `cancel` fires.
    ///
    /// Inputs already in flight run to completion; the rest report
    /// [`Error::Cancelled`].
    pub async fn upload_with_cancel(
        &self,
        inputs: Vec<LogicalInput>,
        cancel: &CancellationToken,
    ) -> Vec<UploadOutcome> {
        let concurrency = self.options.concurrency;

        let mut results: Vec<(usize, UploadOutcome)> = stream::iter(inputs.into_iter().enumerate())
            .map(|(index, input)| async move {
                if cancel.is_cancelled() {
                    let outcome: UploadOutcome = Err::<String, _>(Error::Cancelled).into();
                    return (index, outcome);
                }
                (index, self.upload_one(input).await.into())
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn upload_one(&self, input: LogicalInput) -> Result<String> {
        let name = input.primary_path().display().to_string();
        let result = self.dispatch(input).await;
        match &result {
            Ok(sample_id) => info!("{}: uploaded as sample {}", name, sample_id),
            Err(e) => warn!("{}: upload failed: {}", name, e),
        }
        result
    }

    async fn dispatch(&self, input: LogicalInput) -> Result<String> {
        let size = input.resolve_size().await?;
        let route = self.router.route(size);
        let filename = upload_filename(&input, self.options.validate);
        info!("{}: uploading {} bytes via {:?} path", filename, size, route);

        let options = self.options.clone();
        let progress = self.progress.clone();
        let body = tokio::task::spawn_blocking(move || open_body(&input, &options, progress))
            .await
            .map_err(|e| Error::Internal(format!("input reader panicked: {}", e)))??;

        let job = UploadJob {
            filename,
            size,
            body,
        };
        match route {
            UploadRoute::Simple => self.simple.transfer(job).await,
            UploadRoute::Chunked => self.chunked.transfer(job).await,
        }
    }
}
