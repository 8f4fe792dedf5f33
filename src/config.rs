use crate::fastx::ScanOptions;
use crate::types::LogicalInput;
use crate::{Error, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inputs at or above this many bytes go through the multipart path (5 GB)
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 5 * 1000 * 1000 * 1000;

/// Part size for multipart transfers; the S3 minimum for non-final parts
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(name = "fastx-upload")]
#[command(about = "Validate and upload FASTA/FASTQ files")]
pub struct Config {
    /// Control plane base URL
    #[arg(long, env = "ONE_CODEX_API_URL", default_value = "https://app.onecodex.com")]
    pub api_url: String,

    /// API key, sent as the basic-auth username
    #[arg(long, env = "ONE_CODEX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Number of inputs uploaded concurrently (defaults to the CPU count)
    #[arg(long, env = "FASTX_UPLOAD_THREADS")]
    pub threads: Option<usize>,

    /// Inputs of at least this many bytes use the multipart path
    #[arg(long, env = "FASTX_UPLOAD_MULTIPART_THRESHOLD", default_value_t = DEFAULT_MULTIPART_THRESHOLD)]
    pub multipart_threshold: u64,

    /// Multipart part size in bytes
    #[arg(long, env = "FASTX_UPLOAD_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Region for the multipart object store
    #[arg(long, env = "FASTX_UPLOAD_S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    /// Custom endpoint for S3-compatible object stores
    #[arg(long, env = "FASTX_UPLOAD_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Upload sequence files; write pairs as `R1.fq,R2.fq`
    Upload {
        #[arg(required = true)]
        files: Vec<String>,

        /// Stream files as-is without record validation
        #[arg(long)]
        no_validate: bool,

        /// Accept IUPAC ambiguity codes in sequences
        #[arg(long)]
        allow_iupac: bool,
    },
    /// Download the original reads file of a sample
    Download {
        sample_id: String,

        /// Output path (defaults to `<sample_id>.fastx` in the working directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Config {
    /// Upload options derived from the command line
    pub fn upload_options(&self) -> UploadOptions {
        let mut options = UploadOptions::default()
            .with_multipart_threshold(self.multipart_threshold)
            .with_chunk_size(self.chunk_size);
        if let Some(threads) = self.threads {
            options = options.with_concurrency(threads);
        }
        if let Command::Upload {
            no_validate,
            allow_iupac,
            ..
        } = &self.command
        {
            options = options.with_validate(!no_validate);
            options.scan.allow_iupac = *allow_iupac;
        }
        options
    }
}

/// Parse `a.fq` and `r1.fq,r2.fq` arguments into logical inputs
pub fn parse_inputs(args: &[String]) -> Result<Vec<LogicalInput>> {
    args.iter()
        .map(|arg| {
            let parts: Vec<&str> = arg.split(',').collect();
            match parts.as_slice() {
                [single] if !single.is_empty() => Ok(LogicalInput::single(*single)),
                [first, second] if !first.is_empty() && !second.is_empty() => {
                    Ok(LogicalInput::paired(*first, *second))
                }
                _ => Err(Error::InvalidInput(format!(
                    "expected FILE or FILE1,FILE2 but got {:?}",
                    arg
                ))),
            }
        })
        .collect()
}

/// Knobs for the upload pipeline
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Inputs below this size use the presigned single-request path
    pub multipart_threshold: u64,
    /// Bytes per multipart part
    pub chunk_size: usize,
    /// Maximum inputs in flight
    pub concurrency: usize,
    /// Scan, validate and recompress records before sending
    pub validate: bool,
    pub scan: ScanOptions,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: num_cpus::get(),
            validate: true,
            scan: ScanOptions::default(),
        }
    }
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_multipart_threshold(mut self, threshold: u64) -> Self {
        self.multipart_threshold = threshold;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self.scan.validate = validate;
        self
    }

    pub fn with_scan_options(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }

    pub fn check(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidInput("chunk size must be positive".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidInput("concurrency must be positive".to_string()));
        }
        Ok(())
    }
}
