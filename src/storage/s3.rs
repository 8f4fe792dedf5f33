//! S3 object store for multipart uploads.
//!
//! Supports custom S3 endpoints (MinIO, LocalStack, etc.) with path-style
//! addressing. Objects are written with AES256 server-side encryption.

use super::{CompletedPart, ObjectStore, StoreCredentials, StoreSession};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{self, CompletedMultipartUpload, ServerSideEncryption};
use bytes::Bytes;

/// S3-backed [`ObjectStore`].
///
/// Every upload comes with its own temporary credentials, so each session
/// builds a fresh client from them and nothing is shared between uploads.
pub struct S3ObjectStore {
    region: String,
    endpoint: Option<String>,
}

impl S3ObjectStore {
    /// Create a new S3ObjectStore.
    ///
    /// # Arguments
    ///
    /// * `region` - AWS region of the upload buckets
    /// * `endpoint` - Optional custom endpoint URL (for S3-compatible services)
    pub fn new(region: String, endpoint: Option<String>) -> Self {
        Self { region, endpoint }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn connect(&self, credentials: &StoreCredentials) -> S3Session {
        let provider = Credentials::new(
            &credentials.access_key,
            &credentials.secret_key,
            None,
            None,
            "fastx-upload",
        );
        let sdk_config = aws_config::from_env()
            .region(aws_config::Region::new(self.region.clone()))
            .credentials_provider(provider)
            .load()
            .await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &self.endpoint {
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }
        S3Session {
            client: Client::from_conf(s3_config.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn session(&self, credentials: &StoreCredentials) -> Result<Box<dyn StoreSession>> {
        Ok(Box::new(self.connect(credentials).await))
    }
}

/// Client bound to one upload's credentials
struct S3Session {
    client: Client,
}

#[async_trait]
impl StoreSession for S3Session {
    async fn create_multipart(&self, bucket: &str, key: &str) -> Result<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| Error::Transfer(format!("S3 create_multipart_upload failed: {}", e)))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Transfer("S3 returned no upload id".to_string()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart> {
        let len = body.len();
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                Error::Transfer(format!("S3 upload_part {} failed: {}", part_number, e))
            })?;

        tracing::debug!("uploaded part {} of {} ({} bytes)", part_number, key, len);
        Ok(CompletedPart {
            part_number,
            etag: output.e_tag().unwrap_or_default().to_string(),
        })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let parts = parts
            .iter()
            .map(|part| {
                types::CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect();
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| Error::Transfer(format!("S3 complete_multipart_upload failed: {}", e)))?;
        Ok(())
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| Error::Transfer(format!("S3 abort_multipart_upload failed: {}", e)))?;
        Ok(())
    }
}
