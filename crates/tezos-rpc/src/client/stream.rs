//! Incremental decoding of streamed response bodies.
//!
//! Monitor endpoints keep the response open and write one JSON value per
//! event, back to back, using chunked transfer encoding. [`JsonStream`]
//! buffers body chunks and yields each complete value as soon as its last
//! byte arrives.

use std::marker::PhantomData;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Error;

/// Error type of a body chunk stream.
pub trait ChunkError: std::error::Error + Send + Sync + 'static {
    /// Returns true if the body was cut off rather than failing outright.
    ///
    /// The node sometimes closes monitor streams without writing the final
    /// empty chunk. Such a body is accepted as complete when it ends between
    /// two values.
    fn is_unterminated_body(&self) -> bool;
}

impl ChunkError for reqwest::Error {
    // hyper reports a chunked body closed early as an `UnexpectedEof` io
    // error somewhere down the source chain; resets and read failures differ
    fn is_unterminated_body(&self) -> bool {
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            if let Some(io) = err.downcast_ref::<std::io::Error>() {
                if io.kind() == std::io::ErrorKind::UnexpectedEof {
                    return true;
                }
            }
            source = err.source();
        }
        false
    }
}

impl ChunkError for std::io::Error {
    fn is_unterminated_body(&self) -> bool {
        self.kind() == std::io::ErrorKind::UnexpectedEof
    }
}

/// Sequence of JSON values of type `T` decoded from a stream of byte chunks.
///
/// Values may be split across chunks arbitrarily, and one chunk may hold
/// several values. A value that is itself an array is yielded as one item.
/// Top-level values must be objects, arrays or strings: a bare number at
/// the end of a chunk cannot be told apart from a truncated one.
pub struct JsonStream<S, T> {
    chunks: S,
    buf: Vec<u8>,
    scanner: Scanner,
    done: bool,
    _value: PhantomData<fn() -> T>,
}

impl<S, B, E, T> JsonStream<S, T>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: ChunkError,
    T: DeserializeOwned,
{
    pub fn new(chunks: S) -> Self {
        Self {
            chunks,
            buf: Vec::new(),
            scanner: Scanner::default(),
            done: false,
            _value: PhantomData,
        }
    }

    /// Decode the next value.
    ///
    /// Returns `Ok(None)` once the body has ended cleanly. A decode failure
    /// is terminal; so is a body cut off in the middle of a value.
    pub async fn next_value(&mut self) -> Result<Option<T>, Error> {
        if self.done {
            return Ok(None);
        }

        loop {
            if let Some(value) = self.decode_buffered()? {
                return Ok(Some(value));
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) if e.is_unterminated_body() => return self.finish(true),
                Some(Err(e)) => {
                    self.done = true;
                    return Err(Error::Body(Box::new(e)));
                }
                None => return self.finish(false),
            }
        }
    }

    /// Pop one complete value off the front of the buffer.
    ///
    /// Only bytes appended since the previous call are scanned, and the
    /// value is parsed once its closing byte is buffered.
    fn decode_buffered(&mut self) -> Result<Option<T>, Error> {
        match self.scanner.scan(&self.buf) {
            Scan::Incomplete => {
                if self.scanner.is_idle() {
                    // Only whitespace buffered
                    self.buf.clear();
                    self.scanner = Scanner::default();
                }
                Ok(None)
            }
            Scan::Complete(end) => {
                let decoded = serde_json::from_slice(&self.buf[..end]);
                self.buf.drain(..end);
                self.scanner = Scanner::default();
                decoded.map(Some).map_err(|e| {
                    self.done = true;
                    Error::Decode(e)
                })
            }
            Scan::Scalar => self.decode_scalar(),
        }
    }

    /// Top-level numbers and literals have no closing byte; let serde find the end.
    fn decode_scalar(&mut self) -> Result<Option<T>, Error> {
        let mut values = serde_json::Deserializer::from_slice(&self.buf).into_iter::<T>();
        match values.next() {
            Some(Ok(value)) => {
                let consumed = values.byte_offset();
                self.buf.drain(..consumed);
                self.scanner = Scanner::default();
                Ok(Some(value))
            }
            // Incomplete value, wait for more bytes
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => {
                self.done = true;
                Err(Error::Decode(e))
            }
            None => {
                self.buf.clear();
                self.scanner = Scanner::default();
                Ok(None)
            }
        }
    }

    fn finish(&mut self, unterminated: bool) -> Result<Option<T>, Error> {
        self.done = true;
        let rest = std::mem::take(&mut self.buf);

        if rest.iter().all(u8::is_ascii_whitespace) {
            if unterminated {
                debug!("Response body ended without a terminating chunk");
            }
            return Ok(None);
        }

        // Truncated mid-value; decoding what is left reports where
        serde_json::from_slice(&rest).map(Some).map_err(Error::Decode)
    }
}

enum Scan {
    /// The first value ends at this offset.
    Complete(usize),
    Incomplete,
    /// The first value is a bare scalar.
    Scalar,
}

/// Finds where the first top-level value in the buffer ends.
///
/// Keeps its position between calls so each byte is looked at once.
#[derive(Debug, Default)]
struct Scanner {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scanner {
    /// Nothing but whitespace seen so far.
    fn is_idle(&self) -> bool {
        self.depth == 0 && !self.in_string
    }

    fn scan(&mut self, buf: &[u8]) -> Scan {
        while let Some(&b) = buf.get(self.pos) {
            self.pos += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return Scan::Complete(self.pos);
                    }
                }
                continue;
            }

            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                // A stray closer at depth 0 is handed to the parser to report
                b'}' | b']' if self.depth <= 1 => return Scan::Complete(self.pos),
                b'}' | b']' => self.depth -= 1,
                b if b.is_ascii_whitespace() => {}
                _ if self.depth == 0 => {
                    self.pos -= 1;
                    return Scan::Scalar;
                }
                _ => {}
            }
        }
        Scan::Incomplete
    }
}

/// Derive a token that is cancelled when `parent` is, or after `deadline`.
///
/// Spawns a timer task, so it must be called from within a Tokio runtime.
/// The task exits as soon as the returned token is cancelled.
pub fn with_deadline(parent: &CancellationToken, deadline: Duration) -> CancellationToken {
    let token = parent.child_token();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(deadline) => timer.cancel(),
        }
    });
    token
}
