//! Object store abstraction for multipart uploads.
//!
//! Chunked uploads write parts straight into the bucket named by the control
//! plane, using short-lived credentials it hands out per upload. Each upload
//! opens its own [`StoreSession`] from those [`StoreCredentials`].
//!
//! # Implementations
//!
//! - [`S3ObjectStore`] - AWS S3 and S3-compatible services (feature `s3`)
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "s3")]
//! # {
//! use fastx_upload::storage::S3ObjectStore;
//!
//! let store = S3ObjectStore::new("us-east-1".to_string(), None);
//! # }
//! ```

#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Temporary credentials scoped to one upload
#[derive(Clone)]
pub struct StoreCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// A part accepted by the object store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Opens upload sessions against an S3-like object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bind `credentials` to a session used by a single upload.
    ///
    /// The session is dropped together with its upload; nothing built from
    /// one input's credentials is visible to another.
    async fn session(&self, credentials: &StoreCredentials) -> Result<Box<dyn StoreSession>>;
}

/// Multipart upload primitives bound to one set of credentials
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Start a multipart upload and return its upload id
    async fn create_multipart(&self, bucket: &str, key: &str) -> Result<String>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart>;

    /// Assemble the uploaded parts, in `parts` order, into the final object
    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<()>;

    /// Discard an unfinished upload and any parts stored for it
    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()>;
}
