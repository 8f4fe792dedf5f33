pub mod client;
pub mod config;
pub mod error;
pub mod fastx;
pub mod storage;
pub mod types;
pub mod upload;

pub use config::{Config, UploadOptions};
pub use error::{Error, ErrorKind, Result};
pub use types::{InputFile, LogicalInput, UploadOutcome};
pub use upload::Uploader;
