//! Control plane collaborators.
//!
//! The upload paths talk to two remote parties through these traits:
//!
//! - [`ControlPlane`] issues credentials and records completed uploads
//! - [`UploadTransport`] posts a presigned form upload
//!
//! [`ApiClient`] and [`HttpTransport`] are the reqwest-backed
//! implementations; tests substitute in-memory fakes.

mod api;
mod transport;

pub use api::ApiClient;
pub use transport::HttpTransport;

use crate::Result;
use crate::types::{InitUpload, MultipartCredential, SimpleCredential, UploadType};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Streamed request body handed to an [`UploadTransport`]
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send + Sync>>;

/// Sample bookkeeping API of the control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create a sample and return a presigned upload destination
    async fn init_upload(&self, request: &InitUpload) -> Result<SimpleCredential>;

    /// Obtain temporary object-store credentials for a multipart upload
    async fn init_multipart_upload(&self) -> Result<MultipartCredential>;

    async fn confirm_upload(&self, sample_id: &str, upload_type: UploadType) -> Result<()>;

    /// Hand a finished multipart object over to the control plane.
    ///
    /// Returns the sample id when the server reports one.
    async fn multipart_callback(
        &self,
        callback_url: &str,
        s3_path: &str,
        filename: &str,
    ) -> Result<Option<String>>;

    /// Resolve a time-limited URL for a sample's original reads file
    async fn download_uri(&self, sample_id: &str) -> Result<String>;
}

/// Sends one presigned `multipart/form-data` upload
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Post `fields` in order followed by a streamed `file` part
    async fn post_form(
        &self,
        url: &str,
        fields: Vec<(String, String)>,
        filename: &str,
        body: BodyStream,
    ) -> Result<()>;
}
