/*
 * writer.rs
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

//! Envelope writer: serialises appended payloads as a boundary-delimited body.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use log::{debug, warn};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::payload::Payload;
use crate::config::MultipartConfig;
use crate::error::{MultipartError, Result};
use crate::headers::{
    Headers, CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TRANSFER_ENCODING,
    CONTENT_TYPE,
};
use crate::mime::{quote_boundary, validate_boundary, BodyEncoder, ContentEncoding, TransferEncoding};

struct WriterPart {
    payload: Payload,
    content_encoding: ContentEncoding,
    transfer_encoding: TransferEncoding,
}

impl WriterPart {
    fn is_encoded(&self) -> bool {
        !(self.content_encoding.is_identity() && self.transfer_encoding.is_identity())
    }
}

/// Builds a multipart body. Serialisation is repeatable: every `write` or
/// `as_bytes` produces the same bytes.
pub struct MultipartWriter {
    boundary: String,
    subtype: String,
    headers: Headers,
    parts: Vec<WriterPart>,
    consumed: bool,
    config: MultipartConfig,
}

impl fmt::Debug for MultipartWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartWriter")
            .field("subtype", &self.subtype)
            .field("boundary", &self.boundary)
            .field("parts", &self.parts.len())
            .field("consumed", &self.consumed)
            .finish()
    }
}

fn generate_boundary() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl MultipartWriter {
    /// `subtype` as in `multipart/<subtype>`; a random boundary when none is given.
    pub fn new(subtype: &str, boundary: Option<&str>) -> Result<Self> {
        Self::with_config(subtype, boundary, MultipartConfig::default())
    }

    pub fn with_config(subtype: &str, boundary: Option<&str>, config: MultipartConfig) -> Result<Self> {
        let boundary = match boundary {
            Some(b) => b.to_string(),
            None => generate_boundary(),
        };
        if let Err(reason) = validate_boundary(&boundary, config.get_max_boundary_len()) {
            return Err(MultipartError::InvalidBoundary { boundary, reason });
        }
        let mut headers = Headers::new();
        headers.insert(
            CONTENT_TYPE,
            format!("multipart/{}; boundary={}", subtype, quote_boundary(&boundary)),
        );
        Ok(Self {
            boundary,
            subtype: subtype.to_ascii_lowercase(),
            headers,
            parts: Vec::new(),
            consumed: false,
            config,
        })
    }

    /// Envelope headers: the `Content-Type` carrying the boundary.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Payload> {
        self.parts.iter().map(|p| &p.payload)
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    fn is_form_data(&self) -> bool {
        self.subtype == "form-data"
    }

    /// Wrap `value` in a payload, merge `headers` over its defaults and append it.
    pub fn append<P: Into<Payload>>(&mut self, value: P, headers: Option<Headers>) -> Result<&mut Payload> {
        let mut payload = value.into();
        if let Some(headers) = headers {
            payload.merge_headers(&headers);
        }
        self.append_payload(payload)
    }

    pub fn append_json<T: Serialize + ?Sized>(&mut self, value: &T, headers: Option<Headers>) -> Result<&mut Payload> {
        let payload = Payload::json(value)?;
        self.append(payload, headers)
    }

    pub fn append_form<K: AsRef<str>, V: AsRef<str>>(
        &mut self,
        pairs: &[(K, V)],
        headers: Option<Headers>,
    ) -> Result<&mut Payload> {
        self.append(Payload::form(pairs), headers)
    }

    /// Append a prepared payload. Encoding headers are checked here, not at write time.
    pub fn append_payload(&mut self, mut payload: Payload) -> Result<&mut Payload> {
        let mut content_encoding = ContentEncoding::Identity;
        let mut transfer_encoding = TransferEncoding::Binary;
        if self.is_form_data() {
            // RFC 7578 sections 4.7 and 4.8
            for name in [CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TRANSFER_ENCODING] {
                if payload.headers().contains(name) {
                    return Err(MultipartError::FormDataHeader(name));
                }
            }
            if !payload.headers().contains(CONTENT_DISPOSITION) {
                let name = format!("section-{}", self.parts.len());
                payload.set_content_disposition("form-data", &[("name", &name)]);
            }
        } else {
            content_encoding = ContentEncoding::from_header(payload.headers().get(CONTENT_ENCODING))?;
            transfer_encoding = TransferEncoding::from_header(payload.headers().get(CONTENT_TRANSFER_ENCODING))?;
            if content_encoding.is_identity() && transfer_encoding.is_identity() {
                if let Some(size) = payload.size() {
                    payload.headers_mut().insert(CONTENT_LENGTH, size.to_string());
                }
            }
        }
        let index = self.parts.len();
        self.parts.push(WriterPart {
            payload,
            content_encoding,
            transfer_encoding,
        });
        Ok(&mut self.parts[index].payload)
    }

    /// Serialised length, if every part has a known size and none is encoded.
    pub fn size(&self) -> Option<u64> {
        let boundary = self.boundary.len() as u64;
        let mut total = 0u64;
        for part in &self.parts {
            if part.is_encoded() {
                return None;
            }
            let size = part.payload.size()?;
            // --boundary CRLF, headers and blank line, body, CRLF
            total += 4 + boundary + part.payload.headers().to_bytes().len() as u64 + size + 2;
        }
        // --boundary-- CRLF
        Some(total + boundary + 6)
    }

    /// Serialise the envelope into `sink`. Without `close_boundary` the
    /// terminal `--boundary--` line is left off.
    pub async fn write<W>(&mut self, sink: &mut W, close_boundary: bool) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.write_dyn(sink, close_boundary).await
    }

    pub async fn as_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_dyn(&mut out, true).await?;
        Ok(out)
    }

    // boxed: a nested writer is written from inside its parent's part loop
    pub(crate) fn write_dyn<'a, 'b: 'a>(
        &'a mut self,
        sink: &'a mut (dyn AsyncWrite + Unpin + Send + 'b),
        close_boundary: bool,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let delimiter = format!("--{}\r\n", self.boundary);
            let line_len = self.config.get_base64_line_len();
            for part in self.parts.iter_mut() {
                sink.write_all(delimiter.as_bytes()).await?;
                sink.write_all(&part.payload.headers().to_bytes()).await?;
                if part.is_encoded() {
                    let encoder = BodyEncoder::new(part.content_encoding, part.transfer_encoding, line_len);
                    let mut out = PartEncoder::new(&mut *sink, encoder);
                    part.payload.write_to(&mut out).await?;
                    out.finish().await?;
                } else {
                    part.payload.write_to(&mut *sink).await?;
                }
                sink.write_all(b"\r\n").await?;
            }
            if close_boundary {
                sink.write_all(format!("--{}--\r\n", self.boundary).as_bytes()).await?;
            }
            sink.flush().await?;
            debug!("wrote multipart/{} envelope with {} parts", self.subtype, self.parts.len());
            Ok(())
        })
    }

    /// Close every part that owns a resource, in append order. All parts are
    /// attempted; the first failure is returned. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.consumed {
            return Ok(());
        }
        self.consumed = true;
        let mut first_error = None;
        for (index, part) in self.parts.iter_mut().enumerate() {
            if part.payload.autoclose() || part.payload.is_consumed() {
                continue;
            }
            if let Err(e) = part.payload.close() {
                warn!("closing multipart part {} failed: {}", index, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Encodes everything written through it before passing it on to `inner`.
struct PartEncoder<'a, W: ?Sized> {
    inner: &'a mut W,
    encoder: BodyEncoder,
    pending: Vec<u8>,
    pos: usize,
}

impl<'a, W: AsyncWrite + Unpin + ?Sized> PartEncoder<'a, W> {
    fn new(inner: &'a mut W, encoder: BodyEncoder) -> Self {
        Self {
            inner,
            encoder,
            pending: Vec::new(),
            pos: 0,
        }
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.pos < self.pending.len() {
            let n = ready!(Pin::new(&mut *self.inner).poll_write(cx, &self.pending[self.pos..]))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.pos += n;
        }
        self.pending.clear();
        self.pos = 0;
        Poll::Ready(Ok(()))
    }

    /// Flush the encoder state after the last payload byte.
    async fn finish(mut self) -> Result<()> {
        std::future::poll_fn(|cx| self.poll_drain(cx)).await?;
        let tail = self.encoder.finish()?;
        self.inner.write_all(&tail).await?;
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin + ?Sized> AsyncWrite for PartEncoder<'_, W> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        this.pending = this
            .encoder
            .encode(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut *this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}
