use super::RecordScanner;
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// Progress callback: file name and raw bytes processed so far
pub type ProgressFn = Arc<dyn Fn(&str, u64) + Send + Sync>;

/// Merges one or two record scanners into a single pull-based byte stream.
///
/// Paired scanners are interleaved strictly one record at a time (A, B, A,
/// B, ...). With `recompress` the stream is gzip-encoded on the fly and is a
/// complete, flushed gzip member once [`read`](Translator::read) returns an
/// empty chunk.
pub struct Translator {
    first: RecordScanner,
    second: Option<RecordScanner>,
    encoder: Option<GzEncoder<Vec<u8>>>,
    recompress: bool,
    out: BytesMut,
    finished: bool,
    total_written: u64,
    progress: Option<ProgressFn>,
}

impl Translator {
    pub fn new(first: RecordScanner, second: Option<RecordScanner>, recompress: bool) -> Result<Self> {
        if let Some(second) = &second {
            if first.file_type() != second.file_type() {
                return Err(Error::Format(format!(
                    "paired files {} and {} are different types ({:?}/{:?})",
                    first.name(),
                    second.name(),
                    first.file_type(),
                    second.file_type()
                )));
            }
        }

        Ok(Self::build(first, second, recompress))
    }

    pub fn single(scanner: RecordScanner, recompress: bool) -> Self {
        Self::build(scanner, None, recompress)
    }

    pub fn paired(first: RecordScanner, second: RecordScanner, recompress: bool) -> Result<Self> {
        Self::new(first, Some(second), recompress)
    }

    fn build(first: RecordScanner, second: Option<RecordScanner>, recompress: bool) -> Self {
        Self {
            first,
            second,
            encoder: recompress.then(|| GzEncoder::new(Vec::new(), Compression::default())),
            recompress,
            out: BytesMut::new(),
            finished: false,
            total_written: 0,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_paired(&self) -> bool {
        self.second.is_some()
    }

    pub fn recompress(&self) -> bool {
        self.recompress
    }

    pub fn name(&self) -> &str {
        self.first.name()
    }

    /// Uncompressed record bytes produced so far
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Sum of the underlying scanners' byte budgets
    pub fn bytes_left(&self) -> u64 {
        self.first.bytes_left() + self.second.as_ref().map_or(0, |s| s.bytes_left())
    }

    /// Return up to `max` bytes of output; an empty chunk marks the end.
    pub fn read(&mut self, max: usize) -> Result<Bytes> {
        while self.out.len() < max && !self.finished {
            self.produce()?;
        }
        let n = max.min(self.out.len());
        Ok(self.out.split_to(n).freeze())
    }

    /// Drain the whole remaining stream into memory.
    pub fn read_all(&mut self) -> Result<Bytes> {
        while !self.finished {
            self.produce()?;
        }
        Ok(self.out.split().freeze())
    }

    fn produce(&mut self) -> Result<()> {
        let a = self.first.next_record()?;
        let b = match self.second.as_mut() {
            Some(second) => Some(second.next_record()?),
            None => None,
        };

        match (a, b) {
            (Some(a), None) => self.emit(&a)?,
            (Some(a), Some(Some(b))) => {
                self.emit(&a)?;
                self.emit(&b)?;
            }
            (None, None) | (None, Some(None)) => self.finish()?,
            (Some(_), Some(None)) | (None, Some(Some(_))) => {
                let second = self.second.as_ref().map_or("", |s| s.name());
                return Err(Error::PairMismatch(format!(
                    "paired read files {} and {} are not the same length",
                    self.first.name(),
                    second
                )));
            }
        }

        if let Some(progress) = &self.progress {
            let processed = self.first.processed_bytes()
                + self.second.as_ref().map_or(0, |s| s.processed_bytes());
            progress(self.first.name(), processed);
        }
        Ok(())
    }

    fn emit(&mut self, record: &[u8]) -> Result<()> {
        self.total_written += record.len() as u64;
        match self.encoder.as_mut() {
            Some(encoder) => {
                encoder.write_all(record)?;
                let compressed = encoder.get_mut();
                self.out.extend_from_slice(compressed);
                compressed.clear();
            }
            None => self.out.extend_from_slice(record),
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            let tail = encoder.finish()?;
            self.out.extend_from_slice(&tail);
        }
        self.finished = true;
        tracing::debug!(
            "{}: {} records, {} bytes translated",
            self.first.name(),
            self.first.records() + self.second.as_ref().map_or(0, |s| s.records()),
            self.total_written
        );
        Ok(())
    }
}

impl Read for Translator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = Translator::read(self, buf.len())?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}
