use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sequence file flavour, detected from the first decoded byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Fasta,
    Fastq,
}

impl FileType {
    pub fn from_marker(byte: u8) -> Option<Self> {
        match byte {
            b'>' => Some(FileType::Fasta),
            b'@' => Some(FileType::Fastq),
            _ => None,
        }
    }

    pub fn marker(&self) -> u8 {
        match self {
            FileType::Fasta => b'>',
            FileType::Fastq => b'@',
        }
    }
}

/// One file on disk taking part in an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    /// Size already known to the caller (e.g. from a directory listing);
    /// resolved from file metadata at dispatch time when absent.
    pub size: Option<u64>,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
        }
    }

    pub fn with_size(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size: Some(size),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) async fn resolve_size(&self) -> crate::Result<u64> {
        match self.size {
            Some(size) => Ok(size),
            None => {
                let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
                    Error::InvalidInput(format!("cannot stat {}: {}", self.path.display(), e))
                })?;
                Ok(metadata.len())
            }
        }
    }
}

/// A unit of upload: one file, or forward/reverse files interleaved into one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalInput {
    Single(InputFile),
    Paired(InputFile, InputFile),
}

impl LogicalInput {
    pub fn single(path: impl Into<PathBuf>) -> Self {
        LogicalInput::Single(InputFile::new(path))
    }

    pub fn paired(first: impl Into<PathBuf>, second: impl Into<PathBuf>) -> Self {
        LogicalInput::Paired(InputFile::new(first), InputFile::new(second))
    }

    pub fn is_paired(&self) -> bool {
        matches!(self, LogicalInput::Paired(..))
    }

    /// Path used for naming and log messages
    pub fn primary_path(&self) -> &Path {
        match self {
            LogicalInput::Single(file) | LogicalInput::Paired(file, _) => file.path(),
        }
    }

    /// Effective size: the file size, or the sum of both sizes when paired
    pub async fn resolve_size(&self) -> crate::Result<u64> {
        match self {
            LogicalInput::Single(file) => file.resolve_size().await,
            LogicalInput::Paired(first, second) => {
                Ok(first.resolve_size().await? + second.resolve_size().await?)
            }
        }
    }
}

/// Upload flavour reported to the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    Standard,
    Multipart,
}

/// Request body for `init_upload`
#[derive(Debug, Clone, Serialize)]
pub struct InitUpload {
    pub filename: String,
    pub size: u64,
    pub upload_type: UploadType,
}

/// Presigned single-request upload destination
#[derive(Debug, Clone, Deserialize)]
pub struct SimpleCredential {
    #[serde(rename = "upload_url")]
    pub url: String,
    pub sample_id: String,
    /// Form fields the destination expects ahead of the file part, in order
    #[serde(default)]
    pub additional_fields: serde_json::Map<String, serde_json::Value>,
}

impl SimpleCredential {
    /// Form fields coerced to strings, preserving server order
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.additional_fields
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

/// Temporary object-store credentials for a chunked upload
#[derive(Clone, Deserialize)]
pub struct MultipartCredential {
    #[serde(rename = "s3_bucket")]
    pub bucket: String,
    pub file_id: String,
    pub callback_url: String,
    #[serde(rename = "upload_aws_access_key_id")]
    pub access_key: String,
    #[serde(rename = "upload_aws_secret_access_key")]
    pub secret_key: String,
}

impl std::fmt::Debug for MultipartCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartCredential")
            .field("bucket", &self.bucket)
            .field("file_id", &self.file_id)
            .field("callback_url", &self.callback_url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl MultipartCredential {
    pub fn s3_path(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.file_id)
    }
}

/// Per-input result collected by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success { sample_id: String },
    Failure { kind: ErrorKind, message: String },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }

    pub fn sample_id(&self) -> Option<&str> {
        match self {
            UploadOutcome::Success { sample_id } => Some(sample_id),
            UploadOutcome::Failure { .. } => None,
        }
    }
}

impl From<crate::Result<String>> for UploadOutcome {
    fn from(result: crate::Result<String>) -> Self {
        match result {
            Ok(sample_id) => UploadOutcome::Success { sample_id },
            Err(e) => UploadOutcome::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_credential_field_order() {
        let cred: SimpleCredential = serde_json::from_str(
            r#"{
                "upload_url": "https://bucket.example.com/",
                "sample_id": "abc123",
                "additional_fields": {"key": "uploads/abc", "policy": "p0", "success_action_status": 201}
            }"#,
        )
        .unwrap();

        assert_eq!(cred.url, "https://bucket.example.com/");
        assert_eq!(
            cred.form_fields(),
            vec![
                ("key".to_string(), "uploads/abc".to_string()),
                ("policy".to_string(), "p0".to_string()),
                ("success_action_status".to_string(), "201".to_string()),
            ]
        );
    }

    #[test]
    fn test_multipart_credential_redacts_secret() {
        let cred: MultipartCredential = serde_json::from_str(
            r#"{
                "callback_url": "/api/import_file_from_s3",
                "file_id": "abcdef0987654321",
                "s3_bucket": "multipart-uploads",
                "upload_aws_access_key_id": "aws_key",
                "upload_aws_secret_access_key": "aws_secret_key"
            }"#,
        )
        .unwrap();

        assert_eq!(cred.s3_path(), "s3://multipart-uploads/abcdef0987654321");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("aws_secret_key"));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: UploadOutcome = Ok("s1".to_string()).into();
        assert_eq!(ok.sample_id(), Some("s1"));

        let err: UploadOutcome = Err(Error::Transfer("timeout".into())).into();
        assert!(!err.is_success());
        match err {
            UploadOutcome::Failure { kind, .. } => assert_eq!(kind, ErrorKind::Transfer),
            _ => unreachable!(),
        }
    }
}
