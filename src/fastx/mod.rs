//! Streaming FASTA/FASTQ validation and transcoding.
//!
//! Sequence files are never materialized in memory. A [`SequenceSource`]
//! sniffs compression and record format from the first bytes, a
//! [`RecordScanner`] splits the decoded stream into newline-terminated
//! records, and a [`Translator`] merges one or two scanners into a single
//! pull-based (optionally gzip-recompressed) output stream.
//!
//! # Example
//!
//! ```no_run
//! use fastx_upload::fastx::{RecordScanner, ScanOptions, SequenceSource, Translator};
//!
//! let options = ScanOptions::default();
//! let r1 = RecordScanner::new(SequenceSource::open("reads_R1.fq".as_ref(), &options)?, &options);
//! let r2 = RecordScanner::new(SequenceSource::open("reads_R2.fq".as_ref(), &options)?, &options);
//! let mut translator = Translator::paired(r1, r2, true)?;
//! while !translator.read(64 * 1024)?.is_empty() {}
//! # Ok::<(), fastx_upload::Error>(())
//! ```

mod scanner;
mod source;
mod translator;

pub use scanner::{ByteBudget, Record, RecordScanner};
pub use source::{Compression, MIN_FILE_SIZE, SequenceSource};
pub use translator::{ProgressFn, Translator};

/// Validation knobs for scanning sequence files
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Check sequence characters and FASTQ structure
    pub validate: bool,
    /// Accept IUPAC ambiguity codes in sequences
    pub allow_iupac: bool,
    /// Require file extensions that match the detected format
    pub check_filename: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            validate: true,
            allow_iupac: false,
            check_filename: true,
        }
    }
}
