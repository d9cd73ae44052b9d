//! Lazy record reader over a chunked byte stream.

use std::collections::VecDeque;
use std::marker::PhantomData;

use futures_util::{Stream, StreamExt, stream};
use serde::de::DeserializeOwned;

use super::decoder::DataLineDecoder;

/// Reads typed `data:` records from a stream of byte chunks.
///
/// The reader owns the underlying stream, so the body is released on every
/// exit path: when the reader is dropped after an early return, after an
/// error, or after the end of the stream.
///
/// # Example
///
/// ```
/// use audiobook_core::stream::RecordReader;
/// use futures_util::stream;
///
/// # tokio_test::block_on(async {
/// let chunks = vec![
///     Ok::<_, std::io::Error>(b"data: {\"n\": 1}\nda".to_vec()),
///     Ok(b"ta: {\"n\": 2}\n".to_vec()),
/// ];
/// let mut reader = RecordReader::<_, serde_json::Value>::new(stream::iter(chunks));
/// assert_eq!(reader.next_record().await.unwrap().unwrap()["n"], 1);
/// assert_eq!(reader.next_record().await.unwrap().unwrap()["n"], 2);
/// assert!(reader.next_record().await.unwrap().is_none());
/// # });
/// ```
pub struct RecordReader<S, T> {
    stream: S,
    decoder: DataLineDecoder,
    ready: VecDeque<T>,
    finished: bool,
    _record: PhantomData<fn() -> T>,
}

impl<S, B, E, T> RecordReader<S, T>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    T: DeserializeOwned,
{
    /// Wraps a byte-chunk stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: DataLineDecoder::new(),
            ready: VecDeque::new(),
            finished: false,
            _record: PhantomData,
        }
    }

    /// Returns the next decoded record, `Ok(None)` at end of stream.
    ///
    /// Records already decoded from a chunk are handed out before the next
    /// chunk is read. A read error ends the stream.
    ///
    /// # Errors
    ///
    /// Returns the underlying stream's error when reading a chunk fails.
    pub async fn next_record(&mut self) -> Result<Option<T>, E> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Ok(Some(record));
            }
            if self.finished {
                return Ok(None);
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => {
                    let records = self.decoder.push::<T>(chunk.as_ref());
                    self.ready.extend(records);
                }
                Some(Err(error)) => {
                    self.finished = true;
                    self.ready.clear();
                    return Err(error);
                }
                None => {
                    self.finished = true;
                    self.decoder.finish();
                }
            }
        }
    }

    /// Number of malformed records skipped so far.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.decoder.skipped()
    }

    /// Converts the reader into a finite, non-restartable stream of records.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, E>> {
        stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            match reader.next_record().await {
                Ok(Some(record)) => Some((Ok(record), Some(reader))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }
}
