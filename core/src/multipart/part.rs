/*
 * part.rs
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

//! Reader for one body part of a multipart envelope.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::{Bytes, BytesMut};
use log::trace;
use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio::sync::Mutex;

use super::boundary::{rstrip, BoundaryScanner};
use crate::config::MultipartConfig;
use crate::error::{MultipartError, Result};
use crate::headers::{
    trim_crlf, Headers, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TRANSFER_ENCODING, CONTENT_TYPE,
};
use crate::mime::{
    charset, parse_content_disposition, parse_content_type, BodyDecoder, ContentDisposition,
    ContentEncoding, TransferEncoding,
};
use crate::stream::SharedStream;

/// Immutable per-part data plus the end-of-part flag.
struct PartMeta {
    boundary: String,
    headers: Headers,
    disposition: OnceLock<Option<ContentDisposition>>,
    length: Option<u64>,
    is_form_data: bool,
    default_charset: Option<String>,
    /// Chunk size for whole-part reads, never below the scanner window.
    chunk_size: usize,
    eof: AtomicBool,
}

struct PartState {
    scanner: BoundaryScanner,
    read_bytes: u64,
    decoder: Option<BodyDecoder>,
}

/// Handle to one body part. Clones share the same position, so the owning
/// [`MultipartReader`](super::MultipartReader) can release a part the caller
/// still holds.
///
/// The part has exclusive use of the stream until it reaches its boundary; after
/// that every read returns empty and the stream is positioned at the boundary line.
pub struct BodyPartReader<R> {
    meta: Arc<PartMeta>,
    state: Arc<Mutex<PartState>>,
    stream: SharedStream<R>,
}

impl<R> Clone for BodyPartReader<R> {
    fn clone(&self) -> Self {
        Self {
            meta: Arc::clone(&self.meta),
            state: Arc::clone(&self.state),
            stream: self.stream.clone(),
        }
    }
}

impl<R> std::fmt::Debug for BodyPartReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyPartReader")
            .field("boundary", &self.meta.boundary)
            .field("headers", &self.meta.headers)
            .field("at_eof", &self.at_eof())
            .finish()
    }
}

impl<R> BodyPartReader<R> {
    pub fn headers(&self) -> &Headers {
        &self.meta.headers
    }

    pub fn boundary(&self) -> &str {
        &self.meta.boundary
    }

    /// True once the boundary has been reached, whether or not the caller read the data.
    pub fn at_eof(&self) -> bool {
        self.meta.eof.load(Ordering::Acquire)
    }

    /// Declared Content-Length, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.meta.length
    }

    fn disposition(&self) -> Option<&ContentDisposition> {
        self.meta
            .disposition
            .get_or_init(|| {
                self.meta
                    .headers
                    .get(CONTENT_DISPOSITION)
                    .and_then(parse_content_disposition)
            })
            .as_ref()
    }

    /// `name` parameter of Content-Disposition.
    pub fn name(&self) -> Option<&str> {
        self.disposition().and_then(|d| d.name())
    }

    /// `filename` parameter of Content-Disposition (`filename*` preferred).
    pub fn filename(&self) -> Option<&str> {
        self.disposition().and_then(|d| d.filename())
    }

    /// Charset from the part's Content-Type, else the envelope default set by a
    /// `_charset_` field, else `default`.
    pub fn get_charset(&self, default: &str) -> String {
        self.meta
            .headers
            .get(CONTENT_TYPE)
            .and_then(parse_content_type)
            .and_then(|ct| ct.charset().map(str::to_string))
            .or_else(|| self.meta.default_charset.clone())
            .unwrap_or_else(|| default.to_string())
    }

    fn mark_eof(&self) {
        if !self.meta.eof.swap(true, Ordering::AcqRel) {
            trace!("part {:?} at eof", self.name().unwrap_or(""));
        }
    }

    fn unexpected_eof(&self) -> MultipartError {
        MultipartError::UnexpectedEof(format!("--{}", self.meta.boundary))
    }
}

impl<R: AsyncRead + Unpin + Send> BodyPartReader<R> {
    pub fn new(boundary: &str, headers: Headers, stream: SharedStream<R>) -> Self {
        Self::with_options(boundary, headers, stream, "mixed", None, &MultipartConfig::default())
    }

    /// Part of an envelope with the given multipart subtype.
    pub(crate) fn with_options(
        boundary: &str,
        headers: Headers,
        stream: SharedStream<R>,
        subtype: &str,
        default_charset: Option<String>,
        config: &MultipartConfig,
    ) -> Self {
        let scanner = BoundaryScanner::new(boundary);
        let length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.trim().parse::<u64>().ok());
        let meta = PartMeta {
            boundary: boundary.to_string(),
            headers,
            disposition: OnceLock::new(),
            length,
            is_form_data: subtype.eq_ignore_ascii_case("form-data"),
            default_charset,
            chunk_size: config.get_chunk_size().max(scanner.window_len()),
            eof: AtomicBool::new(false),
        };
        Self {
            meta: Arc::new(meta),
            state: Arc::new(Mutex::new(PartState {
                scanner,
                read_bytes: 0,
                decoder: None,
            })),
            stream,
        }
    }

    /// Whole remaining body, decoded. `None` once the part is exhausted.
    pub async fn next(&self) -> Result<Option<Bytes>> {
        if self.at_eof() {
            return Ok(None);
        }
        self.read(true).await.map(Some)
    }

    /// Whole remaining body, raw or decoded. Empty once the part is exhausted.
    pub async fn read(&self, decode: bool) -> Result<Bytes> {
        if self.at_eof() {
            return Ok(Bytes::new());
        }
        let mut data = BytesMut::new();
        while !self.at_eof() {
            data.extend_from_slice(&self.read_chunk(self.meta.chunk_size).await?);
        }
        if decode {
            self.decode(&data).await
        } else {
            Ok(data.freeze())
        }
    }

    /// Up to `size` raw bytes. A declared Content-Length bounds the read;
    /// otherwise the boundary does, and `size` must cover the boundary window.
    pub async fn read_chunk(&self, size: usize) -> Result<Bytes> {
        if self.at_eof() || size == 0 {
            return Ok(Bytes::new());
        }
        let mut state = self.state.lock().await;
        if self.at_eof() {
            return Ok(Bytes::new());
        }
        let mut stream = self.stream.lock().await;
        let mut reached;
        let mut at_delimiter = false;
        let chunk = match self.meta.length.filter(|&n| n > 0) {
            Some(length) => {
                let want = (size as u64).min(length - state.read_bytes) as usize;
                let chunk = stream.read(want).await?;
                reached = stream.at_eof();
                chunk
            }
            None => {
                let (chunk, found) = state.scanner.scan_chunk(&mut stream, size).await?;
                reached = found;
                at_delimiter = found && state.scanner.matched_at_start();
                chunk
            }
        };
        state.read_bytes += chunk.len() as u64;
        if Some(state.read_bytes) == self.meta.length {
            reached = true;
        }
        if reached {
            // no CRLF to consume when the body is empty and the delimiter opens the stream
            if !at_delimiter {
                let crlf = stream.readline().await?;
                if &crlf[..] != b"\r\n" {
                    return Err(MultipartError::MalformedPart);
                }
            }
            self.mark_eof();
        }
        Ok(chunk)
    }

    /// One line, `\n` kept, except that the line ending before the boundary is
    /// stripped. Empty once the boundary is reached.
    pub async fn readline(&self) -> Result<Bytes> {
        if self.at_eof() {
            return Ok(Bytes::new());
        }
        let state = self.state.lock().await;
        let mut stream = self.stream.lock().await;
        let line = stream.readline().await?;
        if line.is_empty() {
            return Err(self.unexpected_eof());
        }
        if state.scanner.is_boundary(&line) {
            stream.unread_data(&line);
            self.mark_eof();
            return Ok(Bytes::new());
        }
        let next_line = stream.readline().await?;
        stream.unread_data(&next_line);
        if state.scanner.is_boundary(&next_line) {
            // the line ending belongs to the delimiter; the stream now starts at it
            self.mark_eof();
            let keep = trim_crlf(&line).len();
            return Ok(line.slice(..keep));
        }
        Ok(line)
    }

    /// Undo Content-Transfer-Encoding, then Content-Encoding (not for form-data,
    /// RFC 7578 section 4.8). Decoder state carries across calls and is flushed by
    /// the first call made once the part is at eof.
    pub async fn decode(&self, data: &[u8]) -> Result<Bytes> {
        let mut state = self.state.lock().await;
        let last = self.at_eof();
        let mut decoder = match state.decoder.take() {
            Some(decoder) => decoder,
            None => self.new_decoder()?,
        };
        let out = decoder.decode(data, last)?;
        if !last {
            state.decoder = Some(decoder);
        }
        Ok(Bytes::from(out))
    }

    fn new_decoder(&self) -> Result<BodyDecoder> {
        if self.meta.is_form_data {
            let transfer =
                TransferEncoding::from_header(self.meta.headers.get(CONTENT_TRANSFER_ENCODING))?;
            Ok(BodyDecoder::new(transfer, ContentEncoding::Identity))
        } else {
            BodyDecoder::from_headers(&self.meta.headers)
        }
    }

    /// Decoded body as text in `encoding`, else the part charset, else UTF-8.
    pub async fn text(&self, encoding: Option<&str>) -> Result<String> {
        let data = self.read(true).await?;
        let label = self.resolve_charset(encoding);
        charset::decode_text(&data, &label)
    }

    /// Decoded body parsed as JSON. `None` if the part is exhausted or empty.
    pub async fn json<T: DeserializeOwned>(&self, encoding: Option<&str>) -> Result<Option<T>> {
        if self.at_eof() {
            return Ok(None);
        }
        let data = self.read(true).await?;
        if data.is_empty() {
            return Ok(None);
        }
        let text = charset::decode_text(&data, &self.resolve_charset(encoding))?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Decoded body parsed as application/x-www-form-urlencoded, blank values kept.
    pub async fn form(&self, encoding: Option<&str>) -> Result<Vec<(String, String)>> {
        if self.at_eof() {
            return Ok(Vec::new());
        }
        let data = self.read(true).await?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let label = self.resolve_charset(encoding);
        let text = charset::decode_text(rstrip(&data), &label)?;
        charset::parse_form(&text, &label)
    }

    fn resolve_charset(&self, encoding: Option<&str>) -> String {
        match encoding {
            Some(label) => label.to_string(),
            None => self.get_charset("utf-8"),
        }
    }

    /// Skip to the boundary without returning data. No-op once at eof.
    pub async fn release(&self) -> Result<()> {
        while !self.at_eof() {
            self.read_chunk(self.meta.chunk_size).await?;
        }
        Ok(())
    }
}
