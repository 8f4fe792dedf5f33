use super::body::stream_body;
use super::{Transfer, UploadJob};
use crate::Result;
use crate::client::{ControlPlane, UploadTransport};
use crate::types::{InitUpload, UploadType};
use async_trait::async_trait;
use std::sync::Arc;

/// Request body chunk size
const BODY_CHUNK_SIZE: usize = 64 * 1024;

/// Single-request upload through a presigned form.
///
/// Runs `init_upload`, streams the body as the form's `file` part, then
/// confirms the sample. Failures are not retried.
pub struct SimpleUpload {
    control: Arc<dyn ControlPlane>,
    transport: Arc<dyn UploadTransport>,
}

impl SimpleUpload {
    pub fn new(control: Arc<dyn ControlPlane>, transport: Arc<dyn UploadTransport>) -> Self {
        Self { control, transport }
    }
}

#[async_trait]
impl Transfer for SimpleUpload {
    async fn transfer(&self, job: UploadJob) -> Result<String> {
        let request = InitUpload {
            filename: job.filename.clone(),
            size: job.size,
            upload_type: UploadType::Standard,
        };
        let credential = self.control.init_upload(&request).await?;
        tracing::debug!("{} registered as sample {}", job.filename, credential.sample_id);

        let (stream, producer) = stream_body(job.body, BODY_CHUNK_SIZE);
        let posted = self
            .transport
            .post_form(&credential.url, credential.form_fields(), &job.filename, stream)
            .await;
        let produced = producer.finish().await;

        let sent = match (posted, produced) {
            (_, Err(e)) if e.is_content_error() => return Err(e),
            (Err(e), _) => return Err(e),
            (Ok(()), Err(e)) => return Err(e),
            (Ok(()), Ok(sent)) => sent,
        };
        tracing::debug!("{}: sent {} bytes", job.filename, sent);

        self.control
            .confirm_upload(&credential.sample_id, UploadType::Standard)
            .await?;
        Ok(credential.sample_id)
    }
}
