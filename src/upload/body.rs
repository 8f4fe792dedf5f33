//! Blocking byte sources and their bridge onto async request bodies.

use crate::client::BodyStream;
use crate::config::UploadOptions;
use crate::fastx::{ProgressFn, RecordScanner, ScanOptions, SequenceSource, Translator};
use crate::types::{InputFile, LogicalInput};
use crate::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// Chunks buffered between a blocking producer and the request body
const BODY_CHANNEL_DEPTH: usize = 2;

/// Upper bound on a single raw read allocation
const RAW_READ_SIZE: usize = 1024 * 1024;

/// A blocking, pull-based byte source.
///
/// `pull` returns at most `max` bytes; an empty chunk marks the end.
pub trait PullSource: Send {
    fn pull(&mut self, max: usize) -> Result<Bytes>;
}

impl PullSource for Translator {
    fn pull(&mut self, max: usize) -> Result<Bytes> {
        self.read(max)
    }
}

/// Passes a file through unchanged.
pub struct RawSource {
    name: String,
    file: File,
    read: u64,
    progress: Option<ProgressFn>,
}

impl RawSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::InvalidInput(format!("cannot open {}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            file,
            read: 0,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl PullSource for RawSource {
    fn pull(&mut self, max: usize) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(max.min(RAW_READ_SIZE));
        (&mut self.file).take(max as u64).read_to_end(&mut buf)?;
        self.read += buf.len() as u64;
        if let Some(progress) = &self.progress {
            progress(&self.name, self.read);
        }
        Ok(Bytes::from(buf))
    }
}

/// Open the byte source for one input. Blocking.
///
/// Validated inputs go through a recompressing [`Translator`]; a single
/// input with validation disabled is streamed as-is. Pairs are always
/// interleaved, with base checks following `options.validate`.
pub fn open_body(
    input: &LogicalInput,
    options: &UploadOptions,
    progress: Option<ProgressFn>,
) -> Result<Box<dyn PullSource>> {
    let scan = ScanOptions {
        validate: options.validate && options.scan.validate,
        ..options.scan
    };
    let scanner = |file: &InputFile| -> Result<RecordScanner> {
        Ok(RecordScanner::new(SequenceSource::open(file.path(), &scan)?, &scan))
    };

    let translator = match input {
        LogicalInput::Single(file) if !options.validate => {
            let raw = RawSource::open(file.path())?;
            return Ok(match progress {
                Some(progress) => Box::new(raw.with_progress(progress)),
                None => Box::new(raw),
            });
        }
        LogicalInput::Single(file) => Translator::single(scanner(file)?, true),
        LogicalInput::Paired(first, second) => {
            Translator::paired(scanner(first)?, scanner(second)?, true)?
        }
    };

    Ok(match progress {
        Some(progress) => Box::new(translator.with_progress(progress)),
        None => Box::new(translator),
    })
}

/// Pull one chunk on the blocking pool, handing the source back.
pub(crate) async fn pull_blocking(
    mut source: Box<dyn PullSource>,
    max: usize,
) -> Result<(Box<dyn PullSource>, Bytes)> {
    tokio::task::spawn_blocking(move || -> Result<(Box<dyn PullSource>, Bytes)> {
        let chunk = source.pull(max)?;
        Ok((source, chunk))
    })
    .await
    .map_err(|e| Error::Internal(format!("body reader panicked: {}", e)))?
}

/// Handle on the blocking task feeding a [`BodyStream`].
pub(crate) struct BodyProducer {
    handle: JoinHandle<Result<u64>>,
}

impl BodyProducer {
    /// Wait for the producer and return the bytes it sent.
    ///
    /// A failure here is the root cause of any error the consumer saw on the
    /// stream.
    pub(crate) async fn finish(self) -> Result<u64> {
        self.handle
            .await
            .map_err(|e| Error::Internal(format!("body producer panicked: {}", e)))?
    }
}

/// Drive `source` on the blocking pool and expose it as a request body.
///
/// The producer stops quietly when the consumer drops the stream.
pub(crate) fn stream_body(
    mut source: Box<dyn PullSource>,
    chunk_size: usize,
) -> (BodyStream, BodyProducer) {
    let (tx, rx) = mpsc::channel::<Result<Bytes>>(BODY_CHANNEL_DEPTH);

    let handle = tokio::task::spawn_blocking(move || {
        let mut sent = 0u64;
        loop {
            match source.pull(chunk_size) {
                Ok(chunk) if chunk.is_empty() => return Ok(sent),
                Ok(chunk) => {
                    let len = chunk.len() as u64;
                    if tx.blocking_send(Ok(chunk)).is_err() {
                        return Ok(sent);
                    }
                    sent += len;
                }
                Err(e) => {
                    let _ = tx.blocking_send(Err(Error::Transfer(format!(
                        "request body aborted: {}",
                        e
                    ))));
                    return Err(e);
                }
            }
        }
    });

    (
        Box::pin(ReceiverStream::new(rx)),
        BodyProducer { handle },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct Chunks(Vec<Result<Bytes>>);

    impl PullSource for Chunks {
        fn pull(&mut self, _max: usize) -> Result<Bytes> {
            if self.0.is_empty() {
                Ok(Bytes::new())
            } else {
                self.0.remove(0)
            }
        }
    }

    const READS: &[u8] = b">read_one\nACGTACGTACGTACGTACGT\n>read_two\nGGCCGGCCGGCCGGCCGGCC\n>read_three\nTTAATTAATTAA\n";

    #[tokio::test]
    async fn test_stream_body_forwards_chunks() {
        let source = Chunks(vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))]);
        let (stream, producer) = stream_body(Box::new(source), 2);
        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")]);
        assert_eq!(producer.finish().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_stream_body_reports_root_cause() {
        let source = Chunks(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(Error::Format("bad base".to_string())),
        ]);
        let (stream, producer) = stream_body(Box::new(source), 2);
        let items: Vec<Result<Bytes>> = stream.collect().await;
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Transfer(_))));
        assert!(matches!(producer.finish().await, Err(Error::Format(_))));
    }

    #[tokio::test]
    async fn test_stream_body_stops_when_dropped() {
        let source = Chunks((0..16).map(|_| Ok(Bytes::from_static(b"xx"))).collect());
        let (stream, producer) = stream_body(Box::new(source), 2);
        drop(stream);
        assert!(producer.finish().await.is_ok());
    }

    #[tokio::test]
    async fn test_pull_blocking_hands_source_back() {
        let source = Chunks(vec![Ok(Bytes::from_static(b"ab"))]);
        let (source, chunk) = pull_blocking(Box::new(source), 2).await.unwrap();
        assert_eq!(&chunk[..], b"ab");
        let (_, chunk) = pull_blocking(source, 2).await.unwrap();
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_open_body_raw_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fa");
        std::fs::write(&path, READS).unwrap();

        let options = UploadOptions::default().with_validate(false);
        let mut body = open_body(&LogicalInput::single(&path), &options, None).unwrap();
        let mut out = Vec::new();
        loop {
            let chunk = body.pull(10).unwrap();
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        assert_eq!(out, READS);
    }

    #[test]
    fn test_open_body_validated_is_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fa");
        std::fs::write(&path, READS).unwrap();

        let mut body =
            open_body(&LogicalInput::single(&path), &UploadOptions::default(), None).unwrap();
        let chunk = body.pull(usize::MAX).unwrap();
        assert!(chunk.starts_with(&[0x1f, 0x8b]));
    }
}
