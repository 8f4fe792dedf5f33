use super::{ScanOptions, SequenceSource};
use crate::types::FileType;
use crate::{Error, Result};
use std::collections::{BTreeSet, HashSet};
use std::io::{self, Read};

/// Bytes pulled from the source per refill
const READ_SIZE: u64 = 1024 * 1024;

const WHITESPACE: &[u8] = b" \t\n\r\x0b\x0c";
const NUCLEOTIDES: &[u8] = b"ACGTNUXacgtnux";
const IUPAC: &[u8] = b"ABCDGHIKMNRSTUVWXYabcdghikmnrstuvwxy";

/// One newline-terminated FASTA or FASTQ record
pub type Record = Vec<u8>;

/// Remaining-work accounting for one scanner.
///
/// `bytes_left` is zero exactly when the source has been exhausted and
/// every buffered record has been emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteBudget {
    /// Declared raw size of the source
    pub total: u64,
    /// Raw bytes pulled from the source so far
    pub raw_read: u64,
    /// Decoded bytes held but not yet emitted
    pub buffered: u64,
    /// End of the decoded stream has been observed
    pub exhausted: bool,
}

impl ByteBudget {
    pub fn bytes_left(&self) -> u64 {
        let unread = if self.exhausted {
            0
        } else {
            // a source is never done before its end has been seen
            self.total.saturating_sub(self.raw_read).max(1)
        };
        unread + self.buffered
    }
}

/// Splits a decoded FASTA/FASTQ stream into records.
///
/// Records are found by reading ahead to the next record start (FASTA) or
/// the end of the fourth line (FASTQ). Trailing newlines at end of input
/// are dropped and a single `\n` is appended to every record, so output is
/// identical whether the source delivers one chunk or many.
pub struct RecordScanner {
    source: SequenceSource,
    options: ScanOptions,
    valid_bases: [bool; 256],
    buf: Vec<u8>,
    pos: usize,
    search_from: usize,
    eof: bool,
    done: bool,
    records: u64,
    warned: HashSet<&'static str>,
}

impl RecordScanner {
    pub fn new(source: SequenceSource, options: &ScanOptions) -> Self {
        let mut valid_bases = [false; 256];
        let alphabet = if options.allow_iupac { IUPAC } else { NUCLEOTIDES };
        for &b in alphabet.iter().chain(WHITESPACE) {
            valid_bases[b as usize] = true;
        }

        Self {
            source,
            options: *options,
            valid_bases,
            buf: Vec::new(),
            pos: 0,
            search_from: 0,
            eof: false,
            done: false,
            records: 0,
            warned: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn file_type(&self) -> FileType {
        self.source.file_type()
    }

    /// Records emitted so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Raw source bytes consumed, for progress reporting
    pub fn processed_bytes(&self) -> u64 {
        self.source.raw_bytes_read()
    }

    pub fn budget(&self) -> ByteBudget {
        ByteBudget {
            total: self.source.len(),
            raw_read: self.source.raw_bytes_read(),
            buffered: (self.buf.len() - self.pos) as u64,
            exhausted: self.eof,
        }
    }

    pub fn bytes_left(&self) -> u64 {
        self.budget().bytes_left()
    }

    /// Pull the next record, or `None` once the source is exhausted.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if self.done {
            return Ok(None);
        }
        let result = self.scan();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn scan(&mut self) -> Result<Option<Record>> {
        loop {
            let bounds = match self.source.file_type() {
                FileType::Fasta => self.fasta_bounds(),
                FileType::Fastq => self.fastq_bounds()?,
            };

            if let Some((end, next)) = bounds {
                let mut record = Vec::with_capacity(end - self.pos + 1);
                record.extend_from_slice(&self.buf[self.pos..end]);
                record.push(b'\n');
                self.pos = next;
                self.records += 1;
                if self.options.validate {
                    self.validate(&record)?;
                }
                return Ok(Some(record));
            }

            if self.eof {
                return Ok(None);
            }
            self.fill()?;
        }
    }

    /// End of the next FASTA record and the start of the one after it.
    fn fasta_bounds(&mut self) -> Option<(usize, usize)> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let from = self.search_from.max(self.pos);
        match memchr::memmem::find(&self.buf[from..], b"\n>") {
            Some(offset) => {
                let end = from + offset;
                self.search_from = end + 1;
                Some((end, end + 1))
            }
            None if self.eof => Some((self.buf.len(), self.buf.len())),
            None => {
                // the last byte may be the newline of a boundary split across reads
                self.search_from = self.buf.len().saturating_sub(1).max(self.pos);
                None
            }
        }
    }

    /// End of the next four-line FASTQ record and the start of the one after it.
    fn fastq_bounds(&mut self) -> Result<Option<(usize, usize)>> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        let mut cursor = self.pos;
        let mut lines = 0;
        while lines < 4 {
            match memchr::memchr(b'\n', &self.buf[cursor..]) {
                Some(offset) => {
                    lines += 1;
                    if lines == 4 {
                        let end = cursor + offset;
                        return Ok(Some((end, end + 1)));
                    }
                    cursor += offset + 1;
                }
                None => break,
            }
        }

        if !self.eof {
            return Ok(None);
        }
        if lines == 3 && cursor < self.buf.len() {
            return Ok(Some((self.buf.len(), self.buf.len())));
        }
        Err(Error::Format(format!(
            "{} ends with a truncated FASTQ record",
            self.source.name()
        )))
    }

    fn fill(&mut self) -> Result<()> {
        if self.pos > 0 && self.pos >= self.buf.len() / 2 {
            self.buf.drain(..self.pos);
            self.search_from = self.search_from.saturating_sub(self.pos);
            self.pos = 0;
        }

        let read = (&mut self.source).take(READ_SIZE).read_to_end(&mut self.buf);
        let n = read.map_err(|e| self.read_error(e))?;

        if n == 0 {
            self.eof = true;
            while self.buf.len() > self.pos && self.buf.last() == Some(&b'\n') {
                self.buf.pop();
            }
            self.search_from = self.search_from.min(self.buf.len());
        }
        Ok(())
    }

    fn read_error(&self, err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
                Error::Format(format!("{} could not be decoded: {}", self.source.name(), err))
            }
            _ => Error::Io(err),
        }
    }

    fn validate(&mut self, record: &[u8]) -> Result<()> {
        let body = &record[..record.len() - 1];
        let (header, rest) = match memchr::memchr(b'\n', body) {
            Some(i) => (&body[..i], &body[i + 1..]),
            None => (body, &[][..]),
        };

        if header.first() != Some(&self.source.file_type().marker()) {
            return Err(Error::Format(format!(
                "{} has a malformed record header at record {}",
                self.source.name(),
                self.records
            )));
        }
        if header.contains(&b'\t') {
            self.warn_once("tabs", "contains tabs in record headers");
        }

        let sequence = match self.source.file_type() {
            FileType::Fasta => rest,
            FileType::Fastq => self.check_fastq_layout(rest)?,
        };

        let invalid: BTreeSet<u8> = sequence
            .iter()
            .copied()
            .filter(|&b| !self.valid_bases[b as usize])
            .collect();
        if !invalid.is_empty() {
            let chars: Vec<String> = invalid
                .iter()
                .map(|&b| (b as char).escape_default().to_string())
                .collect();
            return Err(Error::Format(format!(
                "{} contains non-nucleic acid characters: {}",
                self.source.name(),
                chars.join(",")
            )));
        }

        if sequence.iter().any(|b| matches!(b, b'U' | b'u' | b'X' | b'x')) {
            self.warn_once("other_bases", "contains U or X bases");
        }
        Ok(())
    }

    /// Check the `seq`/`+`/`qual` lines and return the sequence line.
    fn check_fastq_layout<'a>(&self, rest: &'a [u8]) -> Result<&'a [u8]> {
        let mut lines = rest.splitn(3, |&b| b == b'\n');
        let sequence = lines.next().unwrap_or_default();
        let separator = lines.next().unwrap_or_default();
        let quality = lines.next().unwrap_or_default();

        if separator.first() != Some(&b'+') {
            return Err(Error::Format(format!(
                "{} is missing the '+' line at record {}",
                self.source.name(),
                self.records
            )));
        }
        if trim_cr(sequence).len() != trim_cr(quality).len() {
            return Err(Error::Format(format!(
                "{} has sequence and quality of different lengths at record {}",
                self.source.name(),
                self.records
            )));
        }
        Ok(sequence)
    }

    fn warn_once(&mut self, key: &'static str, message: &str) {
        if self.warned.insert(key) {
            tracing::warn!("{} {}", self.source.name(), message);
        }
    }
}

impl Iterator for RecordScanner {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
