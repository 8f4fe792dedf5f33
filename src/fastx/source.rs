use super::ScanOptions;
use crate::types::FileType;
use crate::{Error, Result};
use bytes::Bytes;
use bzip2::read::MultiBzDecoder;
use flate2::bufread::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Files smaller than this cannot hold a useful amount of sequence
pub const MIN_FILE_SIZE: u64 = 70;

const GZIP_MAGIC: u8 = 0x1f;
const BZIP2_MAGIC: u8 = b'B';

/// Compression detected on the raw input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
}

impl Compression {
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Compression::None => &[],
            Compression::Gzip => &[".gz", ".gzip"],
            Compression::Bzip2 => &[".bz2", ".bz", ".bzip"],
        }
    }
}

/// Counts bytes pulled from the raw input, beneath any decompressor.
struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// A decoded sequence byte stream with its detected format.
pub struct SequenceSource {
    name: String,
    file_type: FileType,
    compression: Compression,
    len: u64,
    raw_read: Arc<AtomicU64>,
    reader: Box<dyn BufRead + Send>,
}

impl SequenceSource {
    /// Open a sequence file from disk.
    pub fn open(path: &Path, options: &ScanOptions) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::InvalidInput(format!("cannot open {}: {}", path.display(), e)))?;
        let len = file.metadata()?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if len < MIN_FILE_SIZE {
            return Err(Error::Format(format!(
                "{} is too small to be analyzed: {} bytes",
                name, len
            )));
        }

        Self::build(Box::new(file), len, name, options.check_filename)
    }

    /// Wrap an arbitrary reader of `len` raw bytes.
    ///
    /// Filename checks only run when `name` is given.
    pub fn from_reader<R>(reader: R, len: u64, name: Option<&str>, options: &ScanOptions) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let check_filename = options.check_filename && name.is_some();
        let name = name.unwrap_or("stream").to_string();
        Self::build(Box::new(reader), len, name, check_filename)
    }

    /// Wrap in-memory data without filename checks.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let data: Bytes = data.into();
        let len = data.len() as u64;
        Self::build(Box::new(Cursor::new(data)), len, "stream".to_string(), false)
    }

    fn build(
        raw: Box<dyn Read + Send>,
        len: u64,
        name: String,
        check_filename: bool,
    ) -> Result<Self> {
        let raw_read = Arc::new(AtomicU64::new(0));
        let mut counted = BufReader::new(CountingReader {
            inner: raw,
            count: Arc::clone(&raw_read),
        });

        let compression = match peek(&mut counted)? {
            Some(GZIP_MAGIC) => Compression::Gzip,
            Some(BZIP2_MAGIC) => Compression::Bzip2,
            _ => Compression::None,
        };

        if check_filename && compression != Compression::None {
            let exts = compression.extensions();
            if !exts.iter().any(|ext| name.ends_with(ext)) {
                return Err(Error::Format(format!(
                    "{} is {:?}-compressed, but lacks a \"{}\" ending",
                    name, compression, exts[0]
                )));
            }
        }

        let mut reader: Box<dyn BufRead + Send> = match compression {
            Compression::None => Box::new(counted),
            Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(counted))),
            Compression::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(counted))),
        };

        let first = peek(&mut reader)
            .map_err(|e| Error::Format(format!("{} could not be decompressed: {}", name, e)))?;
        let file_type = first
            .and_then(FileType::from_marker)
            .ok_or_else(|| Error::Format(format!("{} is not valid FASTX", name)))?;

        if check_filename {
            let (expected, exts): (&str, &[&str]) = match file_type {
                FileType::Fasta => (".fa", &[".fa", ".fna", ".fasta"][..]),
                FileType::Fastq => (".fq", &[".fq", ".fastq"][..]),
            };
            if !exts.iter().any(|ext| name.contains(ext)) {
                return Err(Error::Format(format!(
                    "{} is {:?}, but lacks a \"{}\" ending",
                    name, file_type, expected
                )));
            }
        }

        tracing::debug!(
            "opened {} ({:?}, {:?}, {} bytes)",
            name,
            file_type,
            compression,
            len
        );

        Ok(Self {
            name,
            file_type,
            compression,
            len,
            raw_read,
            reader,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Declared size of the raw input
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw (possibly compressed) bytes consumed so far
    pub fn raw_bytes_read(&self) -> u64 {
        self.raw_read.load(Ordering::Relaxed)
    }
}

impl Read for SequenceSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

fn peek<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<u8>> {
    loop {
        match reader.fill_buf() {
            Ok(buf) => return Ok(buf.first().copied()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
