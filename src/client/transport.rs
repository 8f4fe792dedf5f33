use super::{BodyStream, UploadTransport};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use futures::{StreamExt, future, stream};
use reqwest::Client;
use reqwest::multipart::{Form, Part};

/// Bodies up to this size are buffered and sent with a Content-Length
pub const DEFAULT_BUFFER_LIMIT: usize = 64 * 1024 * 1024;

/// Posts presigned `multipart/form-data` uploads.
///
/// A file body that ends within the buffer limit is sent with a known length,
/// which S3 presigned POST requires. Larger bodies are streamed with chunked
/// transfer encoding, so the receiving endpoint must accept that.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    buffer_limit: usize,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("fastx-upload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
        }
    }

    pub fn with_buffer_limit(mut self, buffer_limit: usize) -> Self {
        self.buffer_limit = buffer_limit;
        self
    }

    /// Read up to `buffer_limit` bytes ahead and build the file part.
    async fn file_part(&self, mut body: BodyStream) -> Result<Part> {
        let mut head = BytesMut::new();
        while let Some(chunk) = body.next().await {
            head.extend_from_slice(&chunk?);
            if head.len() > self.buffer_limit {
                let head = stream::once(future::ready(Ok::<_, Error>(head.freeze())));
                return Ok(Part::stream(reqwest::Body::wrap_stream(head.chain(body))));
            }
        }

        let len = head.len() as u64;
        Ok(Part::stream_with_length(
            reqwest::Body::from(head.freeze()),
            len,
        ))
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn post_form(
        &self,
        url: &str,
        fields: Vec<(String, String)>,
        filename: &str,
        body: BodyStream,
    ) -> Result<()> {
        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name, value);
        }

        let part = self
            .file_part(body)
            .await?
            .file_name(filename.to_string())
            .mime_str("text/plain")
            .map_err(|e| Error::Internal(format!("invalid mime type: {}", e)))?;
        form = form.part("file", part);

        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::debug!("upload of {} rejected: {}", filename, detail);
            return Err(Error::Transfer(format!(
                "upload of {} failed with status {}",
                filename, status
            )));
        }

        tracing::debug!("posted {} to {} ({})", filename, url, status);
        Ok(())
    }
}
