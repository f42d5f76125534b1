//! Append-only observable body buffer.

use bytes::Bytes;

use crate::observable::{Observable, Subscription};

/// Accumulates one request or response body as it streams.
///
/// The buffer never shrinks during the life of an exchange; subscribers
/// receive the full accumulated contents after every append.
#[derive(Clone)]
pub struct ByteSink {
    inner: Observable<Vec<u8>>,
}

impl Default for ByteSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSink {
    pub fn new() -> Self {
        Self {
            inner: Observable::new(Vec::new()),
        }
    }

    /// Append a streamed chunk.
    pub fn append(&self, chunk: &[u8]) {
        self.inner.update(|buffer| buffer.extend_from_slice(chunk));
    }

    /// Copy of the accumulated bytes.
    pub fn bytes(&self) -> Bytes {
        self.inner.with(|buffer| Bytes::copy_from_slice(buffer))
    }

    pub fn len(&self) -> usize {
        self.inner.with(|buffer| buffer.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observe the accumulated contents after each append.
    pub fn subscribe(&self, cb: impl Fn(&[u8]) + Send + Sync + 'static) -> Subscription {
        self.inner.subscribe(move |buffer| cb(buffer))
    }
}
