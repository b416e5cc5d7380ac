/*
 * stream.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Buffered content stream with push-back, shared by every reader of one envelope.

use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Mutex, MutexGuard};

/// Minimum buffer reservation before each read from the underlying reader.
const READ_SIZE: usize = 8192;

/// Byte stream over an [`AsyncRead`] with `read(n)`, `readline()` and push-back.
///
/// Pushed-back bytes are always returned before any new I/O is performed.
pub struct ContentStream<R> {
    inner: R,
    buf: BytesMut,
    eof: bool,
}

impl<R: AsyncRead + Unpin> ContentStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            eof: false,
        }
    }

    /// One read from the underlying reader into the buffer. Returns bytes added (0 at EOF).
    async fn fill(&mut self, hint: usize) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        self.buf.reserve(hint.max(READ_SIZE));
        let n = self.inner.read_buf(&mut self.buf).await?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    /// Up to `n` bytes. Empty only at end of stream (or when `n` is 0).
    pub async fn read(&mut self, n: usize) -> io::Result<Bytes> {
        if n == 0 {
            return Ok(Bytes::new());
        }
        if self.buf.is_empty() {
            self.fill(n).await?;
        }
        let take = n.min(self.buf.len());
        Ok(self.buf.split_to(take).freeze())
    }

    /// Bytes through the next `\n` inclusive, or whatever remains at end of stream.
    pub async fn readline(&mut self) -> io::Result<Bytes> {
        let mut scanned = 0;
        loop {
            if let Some(i) = self.buf[scanned..].iter().position(|&b| b == b'\n') {
                return Ok(self.buf.split_to(scanned + i + 1).freeze());
            }
            scanned = self.buf.len();
            if self.fill(READ_SIZE).await? == 0 {
                return Ok(self.buf.split().freeze());
            }
        }
    }

    pub async fn read_to_end(&mut self) -> io::Result<Bytes> {
        while self.fill(READ_SIZE).await? > 0 {}
        Ok(self.buf.split().freeze())
    }

    /// Underlying reader reported EOF and nothing is buffered.
    pub fn at_eof(&self) -> bool {
        self.eof && self.buf.is_empty()
    }

    /// Push bytes back; the next read returns them first.
    pub fn unread_data(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut joined = BytesMut::with_capacity(data.len() + self.buf.len());
        joined.extend_from_slice(data);
        joined.extend_from_slice(&self.buf);
        self.buf = joined;
    }

    /// Number of bytes buffered (read ahead or pushed back).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Handle to one [`ContentStream`], cloned into every reader of an envelope.
///
/// Readers only touch the stream while they are the active part; the lock
/// serialises access, it does not arbitrate between parts.
pub struct SharedStream<R> {
    inner: Arc<Mutex<ContentStream<R>>>,
}

impl<R> Clone for SharedStream<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: AsyncRead + Unpin> SharedStream<R> {
    pub fn new(reader: R) -> Self {
        Self::from_stream(ContentStream::new(reader))
    }

    pub fn from_stream(stream: ContentStream<R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ContentStream<R>> {
        self.inner.lock().await
    }

    pub async fn at_eof(&self) -> bool {
        self.inner.lock().await.at_eof()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Readers that replay fixed chunks, one per poll, to simulate short reads.

    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, ReadBuf};

    use super::SharedStream;

    pub struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkedReader {
        pub fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            }
        }
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if let Some(mut chunk) = self.chunks.pop_front() {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    let rest = chunk.split_off(n);
                    self.chunks.push_front(rest);
                }
            }
            Poll::Ready(Ok(()))
        }
    }

    pub fn chunked(chunks: &[&[u8]]) -> SharedStream<ChunkedReader> {
        SharedStream::new(ChunkedReader::new(chunks))
    }

    pub fn memory(data: &[u8]) -> SharedStream<io::Cursor<Vec<u8>>> {
        SharedStream::new(io::Cursor::new(data.to_vec()))
    }

    /// Everything left on the stream, for asserting what a reader did not consume.
    pub async fn remaining<R: AsyncRead + Unpin>(stream: &SharedStream<R>) -> Vec<u8> {
        stream.lock().await.read_to_end().await.unwrap().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ChunkedReader;
    use super::*;

    #[tokio::test]
    async fn read_returns_at_most_one_underlying_chunk() {
        let mut s = ContentStream::new(ChunkedReader::new(&[b"abc", b"defgh"]));
        assert_eq!(&s.read(10).await.unwrap()[..], b"abc");
        assert_eq!(&s.read(2).await.unwrap()[..], b"de");
        assert_eq!(&s.read(10).await.unwrap()[..], b"fgh");
        assert!(!s.at_eof());
        assert!(s.read(10).await.unwrap().is_empty());
        assert!(s.at_eof());
    }

    #[tokio::test]
    async fn readline_spans_chunks() {
        let mut s = ContentStream::new(ChunkedReader::new(&[b"he", b"llo\r", b"\nwor", b"ld"]));
        assert_eq!(&s.readline().await.unwrap()[..], b"hello\r\n");
        assert_eq!(&s.readline().await.unwrap()[..], b"world");
        assert!(s.readline().await.unwrap().is_empty());
        assert!(s.at_eof());
    }

    #[tokio::test]
    async fn unread_data_is_served_first() {
        let mut s = ContentStream::new(std::io::Cursor::new(b"tail".to_vec()));
        let head = s.read(2).await.unwrap();
        assert_eq!(&head[..], b"ta");
        s.unread_data(b"xy");
        s.unread_data(b"w");
        assert_eq!(s.buffered(), 5);
        assert_eq!(&s.read_to_end().await.unwrap()[..], b"wxyil");
    }

    #[tokio::test]
    async fn unread_after_eof_clears_eof() {
        let mut s = ContentStream::new(std::io::Cursor::new(b"ab".to_vec()));
        let all = s.read_to_end().await.unwrap();
        assert!(s.at_eof());
        s.unread_data(&all);
        assert!(!s.at_eof());
        assert_eq!(&s.readline().await.unwrap()[..], b"ab");
    }
}
