use super::body::pull_blocking;
use super::{PullSource, Transfer, UploadJob};
use crate::client::ControlPlane;
use crate::storage::{CompletedPart, ObjectStore, StoreCredentials, StoreSession};
use crate::types::{MultipartCredential, UploadType};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Object stores accept at most this many parts per upload
pub const MAX_PARTS: i32 = 10_000;

/// Compute the part size for an input of `size` bytes.
///
/// Never below `chunk_size`, and large enough that `size` plus an eighth
/// (recompressed output can outgrow its input) fits in [`MAX_PARTS`] parts.
pub fn part_size(chunk_size: usize, size: u64) -> usize {
    let budget = size.saturating_add(size / 8);
    let needed = budget.div_ceil(MAX_PARTS as u64);
    usize::try_from(needed).map_or(usize::MAX, |needed| needed.max(chunk_size))
}

/// Chunked upload straight into the object store.
///
/// Parts are pulled and sent sequentially, each at least `chunk_size` bytes
/// (see [`part_size`]). Any failure after the upload is created aborts it
/// before the error is returned.
pub struct MultipartUpload {
    control: Arc<dyn ControlPlane>,
    store: Arc<dyn ObjectStore>,
    chunk_size: usize,
}

impl MultipartUpload {
    pub fn new(
        control: Arc<dyn ControlPlane>,
        store: Arc<dyn ObjectStore>,
        chunk_size: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidInput(
                "multipart chunk size must be positive".to_string(),
            ));
        }
        Ok(Self {
            control,
            store,
            chunk_size,
        })
    }

    async fn upload_parts(
        session: &dyn StoreSession,
        target: &MultipartCredential,
        upload_id: &str,
        body: Box<dyn PullSource>,
        part_size: usize,
    ) -> Result<Vec<CompletedPart>> {
        let mut source = body;
        let mut parts = Vec::new();
        let mut part_number = 1;

        loop {
            let (next, chunk) = pull_blocking(source, part_size).await?;
            source = next;
            if chunk.is_empty() {
                break;
            }
            if part_number > MAX_PARTS {
                return Err(Error::InvalidInput(format!(
                    "upload needs more than {} parts of {} bytes",
                    MAX_PARTS, part_size
                )));
            }

            let part = session
                .upload_part(&target.bucket, &target.file_id, upload_id, part_number, chunk)
                .await?;
            parts.push(part);
            part_number += 1;
        }

        if parts.is_empty() {
            let part = session
                .upload_part(&target.bucket, &target.file_id, upload_id, 1, bytes::Bytes::new())
                .await?;
            parts.push(part);
        }
        Ok(parts)
    }
}

#[async_trait]
impl Transfer for MultipartUpload {
    async fn transfer(&self, job: UploadJob) -> Result<String> {
        let part_size = part_size(self.chunk_size, job.size);
        let target = self.control.init_multipart_upload().await?;
        let session = self
            .store
            .session(&StoreCredentials {
                access_key: target.access_key.clone(),
                secret_key: target.secret_key.clone(),
            })
            .await?;

        let upload_id = session
            .create_multipart(&target.bucket, &target.file_id)
            .await?;
        tracing::debug!(
            "{}: multipart upload {} started with {} byte parts",
            job.filename,
            upload_id,
            part_size
        );

        let result = async {
            let parts =
                Self::upload_parts(session.as_ref(), &target, &upload_id, job.body, part_size)
                    .await?;
            session
                .complete_multipart(&target.bucket, &target.file_id, &upload_id, &parts)
                .await?;
            Ok::<usize, Error>(parts.len())
        }
        .await;

        let parts = match result {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(abort) = session
                    .abort_multipart(&target.bucket, &target.file_id, &upload_id)
                    .await
                {
                    warn!("failed to abort multipart upload {}: {}", upload_id, abort);
                }
                return Err(e);
            }
        };
        drop(session);
        tracing::debug!("{}: {} parts stored at {}", job.filename, parts, target.s3_path());

        let sample_id = self
            .control
            .multipart_callback(&target.callback_url, &target.s3_path(), &job.filename)
            .await?
            .unwrap_or_else(|| target.file_id.clone());
        self.control
            .confirm_upload(&sample_id, UploadType::Multipart)
            .await?;
        Ok(sample_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CHUNK_SIZE;

    #[test]
    fn test_part_size_keeps_configured_chunk_for_small_inputs() {
        assert_eq!(part_size(DEFAULT_CHUNK_SIZE, 0), DEFAULT_CHUNK_SIZE);
        assert_eq!(part_size(DEFAULT_CHUNK_SIZE, 5_000_000_000), DEFAULT_CHUNK_SIZE);
        assert_eq!(part_size(1, 100), 1);
    }

    #[test]
    fn test_part_size_grows_to_fit_part_limit() {
        let size = 60_000_000_000u64;
        let part = part_size(DEFAULT_CHUNK_SIZE, size);
        assert!(part > DEFAULT_CHUNK_SIZE);
        assert!(part as u64 * MAX_PARTS as u64 >= size + size / 8);

        // 1500 FASTA records at one byte per part would need far more than MAX_PARTS
        let part = part_size(1, 150_000);
        assert_eq!(part, 17);
        assert!(150_000u64.div_ceil(part as u64) <= MAX_PARTS as u64);
    }
}
