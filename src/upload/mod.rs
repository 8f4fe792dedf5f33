//! Upload orchestration.
//!
//! Each logical input is routed by size to one of two [`Transfer`]
//! strategies:
//!
//! - [`SimpleUpload`] streams the body into a presigned form upload
//! - [`MultipartUpload`] writes parts into the object store
//!
//! [`Uploader`] runs inputs concurrently and reports one
//! [`UploadOutcome`](crate::types::UploadOutcome) per input, in input order.

mod body;
mod multipart;
mod naming;
mod scheduler;
mod simple;

pub use body::{PullSource, RawSource, open_body};
pub use multipart::{MAX_PARTS, MultipartUpload, part_size};
pub use naming::upload_filename;
pub use scheduler::Uploader;
pub use simple::SimpleUpload;

use crate::Result;
use async_trait::async_trait;

/// Transfer path chosen for an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRoute {
    Simple,
    Chunked,
}

/// Size-based choice between the two transfer paths.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    threshold: u64,
}

impl Router {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    /// Inputs strictly below the threshold take the simple path
    pub fn route(&self, size: u64) -> UploadRoute {
        if size < self.threshold {
            UploadRoute::Simple
        } else {
            UploadRoute::Chunked
        }
    }
}

/// One input ready for transfer
pub struct UploadJob {
    /// Name registered with the control plane
    pub filename: String,
    /// Effective input size used for routing
    pub size: u64,
    pub body: Box<dyn PullSource>,
}

/// Moves one input's bytes to remote storage and returns its sample id
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn transfer(&self, job: UploadJob) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MULTIPART_THRESHOLD;

    #[test]
    fn test_route_threshold() {
        let router = Router::new(DEFAULT_MULTIPART_THRESHOLD);
        assert_eq!(router.route(1000), UploadRoute::Simple);
        assert_eq!(router.route(600_000), UploadRoute::Simple);
        assert_eq!(router.route(DEFAULT_MULTIPART_THRESHOLD - 1), UploadRoute::Simple);
        assert_eq!(router.route(DEFAULT_MULTIPART_THRESHOLD), UploadRoute::Chunked);
        assert_eq!(router.route(50_000_000_000), UploadRoute::Chunked);
    }
}
