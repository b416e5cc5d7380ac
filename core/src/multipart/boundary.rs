/*
 * boundary.rs
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

//! Boundary detection (RFC 2046 section 5.1.1).
//!
//! Line mode classifies whole lines; chunk mode looks for `CRLF--boundary` in a
//! window of the previous chunk plus fresh lookahead, pushing the match and
//! everything after it back onto the stream.

use bytes::{Bytes, BytesMut};
use log::trace;
use tokio::io::AsyncRead;

use crate::error::{MultipartError, Result};
use crate::stream::ContentStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryLine {
    /// `--boundary`: another part follows.
    Separator,
    /// `--boundary--`: end of the envelope.
    Terminal,
    /// Anything else, including lines that merely start with the delimiter.
    Content,
}

/// ASCII whitespace stripped from the right.
pub(crate) fn rstrip(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &line[..end]
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[derive(Debug, Clone)]
pub struct BoundaryScanner {
    /// `--boundary`
    delimiter: Bytes,
    /// `\r\n--boundary`
    probe: Bytes,
    prev_chunk: Option<Bytes>,
    at_start: bool,
}

impl BoundaryScanner {
    pub fn new(boundary: &str) -> Self {
        let mut delimiter = BytesMut::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());
        let mut probe = BytesMut::with_capacity(delimiter.len() + 2);
        probe.extend_from_slice(b"\r\n");
        probe.extend_from_slice(&delimiter);
        Self {
            delimiter: delimiter.freeze(),
            probe: probe.freeze(),
            prev_chunk: None,
            at_start: false,
        }
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Lookahead kept past each chunk: the delimiter plus its leading CRLF.
    /// Also the smallest chunk size chunk mode accepts.
    pub fn window_len(&self) -> usize {
        self.delimiter.len() + 2
    }

    pub fn classify(&self, line: &[u8]) -> BoundaryLine {
        let line = rstrip(line);
        match line.strip_prefix(&self.delimiter[..]) {
            Some(b"") => BoundaryLine::Separator,
            Some(b"--") => BoundaryLine::Terminal,
            _ => BoundaryLine::Content,
        }
    }

    pub fn is_boundary(&self, line: &[u8]) -> bool {
        self.classify(line) != BoundaryLine::Content
    }

    /// Whether the boundary was found as the very first bytes of the stream,
    /// with no CRLF before it.
    pub fn matched_at_start(&self) -> bool {
        self.at_start
    }

    fn opens_with_delimiter(&self, window: &[u8]) -> bool {
        let line = match window.iter().position(|&b| b == b'\n') {
            Some(i) => &window[..=i],
            None => window,
        };
        self.is_boundary(line)
    }

    /// Next chunk of part data (at most `size` bytes) and whether the boundary has
    /// been reached. The returned data lags one read behind the stream so that a
    /// delimiter split across reads is still seen whole. On a match the stream is
    /// left positioned at the CRLF preceding the delimiter. A delimiter line at the
    /// very start of the stream also matches, as if a line break preceded it; the
    /// stream is then left untouched.
    pub async fn scan_chunk<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut ContentStream<R>,
        size: usize,
    ) -> Result<(Bytes, bool)> {
        let window_len = self.window_len();
        if size < window_len {
            return Err(MultipartError::ChunkTooSmall {
                size,
                boundary_len: window_len,
            });
        }
        let first_chunk = self.prev_chunk.is_none();
        let prev = match self.prev_chunk.take() {
            Some(prev) => prev,
            None => stream.read(size).await?,
        };

        // short reads: keep going until the lookahead can hold a whole delimiter
        let mut chunk = BytesMut::new();
        while chunk.len() < window_len {
            let more = stream.read(size).await?;
            chunk.extend_from_slice(&more);
            if stream.at_eof() {
                break;
            }
        }
        if chunk.len() > size {
            stream.unread_data(&chunk[size..]);
            chunk.truncate(size);
        }

        let mut window = BytesMut::with_capacity(prev.len() + chunk.len());
        window.extend_from_slice(&prev);
        window.extend_from_slice(&chunk);
        if first_chunk && self.opens_with_delimiter(&window) {
            stream.unread_data(&window);
            self.prev_chunk = Some(Bytes::new());
            self.at_start = true;
            trace!("boundary {:?} opens the stream", String::from_utf8_lossy(&self.delimiter));
            return Ok((Bytes::new(), true));
        }
        let from = if first_chunk {
            0
        } else {
            prev.len().saturating_sub(self.probe.len())
        };

        match find(&window[from..], &self.probe).map(|i| i + from) {
            Some(idx) => {
                stream.unread_data(&window[idx..]);
                let mut window = window.freeze();
                let cut = idx.min(prev.len());
                let result = window.split_to(cut);
                let rest = window.split_to(idx - cut);
                let reached = rest.is_empty();
                if reached {
                    trace!("boundary {:?} reached", String::from_utf8_lossy(&self.delimiter));
                }
                self.prev_chunk = Some(rest);
                Ok((result, reached))
            }
            None => {
                if prev.is_empty() && stream.at_eof() {
                    return Err(MultipartError::UnexpectedEof(
                        String::from_utf8_lossy(&self.delimiter).into_owned(),
                    ));
                }
                self.prev_chunk = Some(chunk.freeze());
                Ok((prev, false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::test_support::ChunkedReader;
    use rstest::rstest;

    #[rstest]
    #[case(b"--:\r\n", BoundaryLine::Separator)]
    #[case(b"--:", BoundaryLine::Separator)]
    #[case(b"--:--\r\n", BoundaryLine::Terminal)]
    #[case(b"--:--  \n", BoundaryLine::Terminal)]
    #[case(b"--:--", BoundaryLine::Terminal)]
    #[case(b"--:x\r\n", BoundaryLine::Content)]
    #[case(b"--:---\r\n", BoundaryLine::Content)]
    #[case(b"hello\r\n", BoundaryLine::Content)]
    fn classify_lines(#[case] line: &[u8], #[case] expected: BoundaryLine) {
        assert_eq!(BoundaryScanner::new(":").classify(line), expected);
    }

    #[test]
    fn rstrip_whitespace() {
        assert_eq!(rstrip(b"abc \t\r\n"), b"abc");
        assert_eq!(rstrip(b" \r\n"), b"");
        assert_eq!(rstrip(b""), b"");
    }

    async fn drain(scanner: &mut BoundaryScanner, stream: &mut ContentStream<ChunkedReader>, size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let (chunk, reached) = scanner.scan_chunk(stream, size).await.unwrap();
            out.extend_from_slice(&chunk);
            if reached {
                return out;
            }
        }
    }

    #[tokio::test]
    async fn stops_before_crlf_delimiter() {
        let mut scanner = BoundaryScanner::new(":");
        let mut stream = ContentStream::new(ChunkedReader::new(&[b"Hello, world!\r\n--:\r\nnext"]));
        assert_eq!(drain(&mut scanner, &mut stream, 8).await, b"Hello, world!");
        assert_eq!(&stream.readline().await.unwrap()[..], b"\r\n");
        assert_eq!(&stream.readline().await.unwrap()[..], b"--:\r\n");
    }

    #[tokio::test]
    async fn delimiter_opening_the_stream() {
        let mut scanner = BoundaryScanner::new(":");
        let mut stream = ContentStream::new(ChunkedReader::new(&[b"-", b"-:", b"--\r\n"]));
        let (data, reached) = scanner.scan_chunk(&mut stream, 8).await.unwrap();
        assert!(data.is_empty());
        assert!(reached);
        assert!(scanner.matched_at_start());
        assert_eq!(&stream.read_to_end().await.unwrap()[..], b"--:--\r\n");
    }

    #[tokio::test]
    async fn delimiter_split_across_reads() {
        let mut scanner = BoundaryScanner::new("boundary");
        let mut stream = ContentStream::new(ChunkedReader::new(&[
            b"0123456789\r",
            b"\n--boun",
            b"dary--\r\n",
        ]));
        assert_eq!(drain(&mut scanner, &mut stream, 12).await, b"0123456789");
        assert_eq!(&stream.read_to_end().await.unwrap()[..], b"\r\n--boundary--\r\n");
    }

    #[tokio::test]
    async fn near_miss_is_data() {
        let mut scanner = BoundaryScanner::new(":");
        let mut stream = ContentStream::new(ChunkedReader::new(&[b"a\r\n-:b\r\n--:--"]));
        assert_eq!(drain(&mut scanner, &mut stream, 5).await, b"a\r\n-:b");
    }

    #[tokio::test]
    async fn chunk_smaller_than_window() {
        let mut scanner = BoundaryScanner::new("boundary");
        let mut stream = ContentStream::new(ChunkedReader::new(&[b"data"]));
        let err = scanner.scan_chunk(&mut stream, 4).await.unwrap_err();
        assert!(matches!(err, MultipartError::ChunkTooSmall { size: 4, boundary_len: 12 }));
    }

    #[tokio::test]
    async fn eof_without_delimiter() {
        let mut scanner = BoundaryScanner::new(":");
        let mut stream = ContentStream::new(ChunkedReader::new(&[b"Hello, World!\r\n-"]));
        let mut out = Vec::new();
        let err = loop {
            match scanner.scan_chunk(&mut stream, 7).await {
                Ok((chunk, reached)) => {
                    assert!(!reached);
                    out.extend_from_slice(&chunk);
                }
                Err(e) => break e,
            }
        };
        assert_eq!(out, b"Hello, World!\r\n-");
        assert!(matches!(err, MultipartError::UnexpectedEof(_)));
    }
}
