//! HTTP control plane client.

use super::ControlPlane;
use crate::types::{InitUpload, MultipartCredential, SimpleCredential, UploadType};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

const INIT_UPLOAD_PATH: &str = "/api/v1/samples/init_upload";
const INIT_MULTIPART_PATH: &str = "/api/v1/samples/init_multipart_upload";
const CONFIRM_UPLOAD_PATH: &str = "/api/v1/samples/confirm_upload";

#[derive(Debug, Serialize)]
struct ConfirmUpload<'a> {
    sample_id: &'a str,
    upload_type: UploadType,
}

#[derive(Debug, Serialize)]
struct MultipartCallback<'a> {
    s3_path: &'a str,
    filename: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct CallbackResponse {
    sample_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadUri {
    download_uri: String,
}

/// reqwest-backed [`ControlPlane`].
pub struct ApiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Control plane root (e.g. "https://app.onecodex.com")
    /// * `api_key` - Optional API key, sent as the basic-auth username
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("fastx-upload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;
        Self::with_client(client, base_url, api_key)
    }

    pub fn with_client(client: Client, base_url: &str, api_key: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidInput(format!("invalid API URL {}: {}", base_url, e)))?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Resolve a server path (or absolute URL) against the base URL
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidInput(format!("invalid endpoint {}: {}", path, e)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.api_key {
            Some(key) => request.basic_auth(key, Some("")),
            None => request,
        }
    }

    /// Download a sample's original reads file to `path`, returning the bytes written.
    pub async fn download(&self, sample_id: &str, path: &Path) -> Result<u64> {
        let uri = self.download_uri(sample_id).await?;
        let mut response = self.client.get(&uri).send().await?;
        if !response.status().is_success() {
            return Err(Error::Transfer(format!(
                "download of {} failed with status {}",
                sample_id,
                response.status()
            )));
        }

        let mut file = fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!("downloaded {} ({} bytes) to {:?}", sample_id, written, path);
        Ok(written)
    }
}

#[async_trait]
impl ControlPlane for ApiClient {
    async fn init_upload(&self, request: &InitUpload) -> Result<SimpleCredential> {
        let url = self.endpoint(INIT_UPLOAD_PATH)?;
        let response = self.request(Method::POST, url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(Error::Credential(format!(
                "init_upload for {} refused with status {}",
                request.filename,
                response.status()
            )));
        }

        response
            .json::<SimpleCredential>()
            .await
            .map_err(|e| Error::Credential(format!("invalid init_upload response: {}", e)))
    }

    async fn init_multipart_upload(&self) -> Result<MultipartCredential> {
        let url = self.endpoint(INIT_MULTIPART_PATH)?;
        let response = self.request(Method::GET, url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Credential(format!(
                "init_multipart_upload refused with status {}",
                response.status()
            )));
        }

        let mut credential = response.json::<MultipartCredential>().await.map_err(|e| {
            Error::Credential(format!("invalid init_multipart_upload response: {}", e))
        })?;
        credential.callback_url = self.endpoint(&credential.callback_url)?.to_string();
        Ok(credential)
    }

    async fn confirm_upload(&self, sample_id: &str, upload_type: UploadType) -> Result<()> {
        let url = self.endpoint(CONFIRM_UPLOAD_PATH)?;
        let body = ConfirmUpload {
            sample_id,
            upload_type,
        };
        let response = self.request(Method::POST, url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(Error::Transfer(format!(
                "confirm_upload of {} failed with status {}",
                sample_id,
                response.status()
            )));
        }
        Ok(())
    }

    async fn multipart_callback(
        &self,
        callback_url: &str,
        s3_path: &str,
        filename: &str,
    ) -> Result<Option<String>> {
        let url = self.endpoint(callback_url)?;
        let body = MultipartCallback { s3_path, filename };
        let response = self.request(Method::POST, url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(Error::Transfer(format!(
                "upload confirmation of {} failed with status {}",
                filename,
                response.status()
            )));
        }

        // an empty or non-JSON body is a valid acknowledgement
        let text = response.text().await?;
        let parsed: CallbackResponse = serde_json::from_str(&text).unwrap_or_default();
        Ok(parsed.sample_id)
    }

    async fn download_uri(&self, sample_id: &str) -> Result<String> {
        let url = self.endpoint(&format!("/api/v1/samples/{}/download_uri", sample_id))?;
        let response = self.request(Method::POST, url).send().await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::PAYMENT_REQUIRED => {
                return Err(Error::InvalidInput(
                    "downloading samples requires a premium platform account".to_string(),
                ));
            }
            status => {
                return Err(Error::Transfer(format!(
                    "download of {} failed with status {}",
                    sample_id, status
                )));
            }
        }

        let uri: DownloadUri = response
            .json()
            .await
            .map_err(|e| Error::Transfer(format!("invalid download_uri response: {}", e)))?;
        Ok(uri.download_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let client = ApiClient::new("https://app.example.com", None).unwrap();
        assert_eq!(
            client.endpoint(INIT_UPLOAD_PATH).unwrap().as_str(),
            "https://app.example.com/api/v1/samples/init_upload"
        );
        assert_eq!(
            client.endpoint("/api/import_file_from_s3").unwrap().as_str(),
            "https://app.example.com/api/import_file_from_s3"
        );
        assert_eq!(
            client.endpoint("https://other.example.com/cb").unwrap().as_str(),
            "https://other.example.com/cb"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url", None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_confirm_body_shape() {
        let body = ConfirmUpload {
            sample_id: "abc",
            upload_type: UploadType::Standard,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sample_id"], "abc");
        assert_eq!(json["upload_type"], "standard");
    }
}
