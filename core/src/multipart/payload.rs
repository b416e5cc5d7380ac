/*
 * payload.rs
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

//! Values appended to a [`MultipartWriter`]: headers plus a body that can be
//! serialised any number of times.

use std::fmt;
use std::io::{self, SeekFrom};

use bytes::Bytes;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use super::writer::MultipartWriter;
use crate::error::Result;
use crate::headers::{Headers, CONTENT_DISPOSITION, CONTENT_TYPE};
use crate::mime::{charset, format_content_disposition};

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A seekable async byte source for stream payloads. The writer rewinds it to
/// the position it had on the first write before every serialisation.
pub trait StreamSource: AsyncRead + AsyncSeek + Unpin + Send {
    /// Called once by [`MultipartWriter::close`].
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Bytes left from the current position, when known. Asked once, when the
    /// payload is built.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

impl<T: AsRef<[u8]> + Unpin + Send> StreamSource for io::Cursor<T> {
    fn size_hint(&self) -> Option<u64> {
        let len = self.get_ref().as_ref().len() as u64;
        Some(len.saturating_sub(self.position()))
    }
}

pub enum PayloadBody {
    Bytes(Bytes),
    Text(String),
    Stream {
        source: Box<dyn StreamSource>,
        /// Position observed on the first write.
        start: Option<u64>,
        /// Bytes from the starting position, as reported when the payload was built.
        size: Option<u64>,
    },
    Multipart(MultipartWriter),
}

impl fmt::Debug for PayloadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadBody::Bytes(data) => f.debug_tuple("Bytes").field(&data.len()).finish(),
            PayloadBody::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            PayloadBody::Stream { start, size, .. } => f
                .debug_struct("Stream")
                .field("start", start)
                .field("size", size)
                .finish(),
            PayloadBody::Multipart(writer) => f.debug_tuple("Multipart").field(&writer.boundary()).finish(),
        }
    }
}

#[derive(Debug)]
pub struct Payload {
    headers: Headers,
    body: PayloadBody,
    autoclose: bool,
    consumed: bool,
}

impl Payload {
    fn with_body(content_type: &str, body: PayloadBody, autoclose: bool) -> Self {
        let mut headers = Headers::new();
        headers.insert(CONTENT_TYPE, content_type);
        Self {
            headers,
            body,
            autoclose,
            consumed: false,
        }
    }

    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::with_body(OCTET_STREAM, PayloadBody::Bytes(data.into()), true)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::with_body(TEXT_PLAIN_UTF8, PayloadBody::Text(text.into()), true)
    }

    pub fn stream(source: impl StreamSource + 'static) -> Self {
        Self::boxed_stream(Box::new(source))
    }

    pub fn boxed_stream(source: Box<dyn StreamSource>) -> Self {
        let size = source.size_hint();
        Self::with_body(OCTET_STREAM, PayloadBody::Stream { source, start: None, size }, false)
    }

    /// Nested envelope; takes the writer's own Content-Type.
    pub fn multipart(writer: MultipartWriter) -> Self {
        let headers = writer.headers().clone();
        Self {
            headers,
            body: PayloadBody::Multipart(writer),
            autoclose: false,
            consumed: false,
        }
    }

    /// Compact JSON serialisation of `value`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let data = serde_json::to_vec(value)?;
        Ok(Self::with_body(APPLICATION_JSON, PayloadBody::Bytes(Bytes::from(data)), true))
    }

    pub fn form<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> Self {
        let body = charset::encode_form(pairs);
        Self::with_body(FORM_URLENCODED, PayloadBody::Bytes(Bytes::from(body)), true)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Caller headers win over the defaults.
    pub fn merge_headers(&mut self, headers: &Headers) {
        self.headers.merge(headers);
    }

    pub fn body(&self) -> &PayloadBody {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)
    }

    /// Set Content-Disposition, replacing any previous value.
    pub fn set_content_disposition(&mut self, disposition_type: &str, params: &[(&str, &str)]) {
        self.headers
            .insert(CONTENT_DISPOSITION, format_content_disposition(disposition_type, params));
    }

    /// Serialised body length, when it can be known without writing.
    pub fn size(&self) -> Option<u64> {
        match &self.body {
            PayloadBody::Bytes(data) => Some(data.len() as u64),
            PayloadBody::Text(text) => Some(text.len() as u64),
            PayloadBody::Stream { size, .. } => *size,
            PayloadBody::Multipart(writer) => writer.size(),
        }
    }

    /// Lifecycle owned by the payload itself; `close` is not needed.
    pub fn autoclose(&self) -> bool {
        self.autoclose
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Write the raw body. Stream sources are rewound first.
    pub(crate) async fn write_to(&mut self, sink: &mut (dyn AsyncWrite + Unpin + Send + '_)) -> Result<()> {
        match &mut self.body {
            PayloadBody::Bytes(data) => sink.write_all(data).await?,
            PayloadBody::Text(text) => sink.write_all(text.as_bytes()).await?,
            PayloadBody::Stream { source, start, .. } => {
                let origin = match *start {
                    Some(origin) => origin,
                    None => {
                        let origin = source.stream_position().await?;
                        *start = Some(origin);
                        origin
                    }
                };
                source.seek(SeekFrom::Start(origin)).await?;
                tokio::io::copy(source, sink).await?;
            }
            PayloadBody::Multipart(writer) => writer.write_dyn(sink, true).await?,
        }
        Ok(())
    }

    /// Close the underlying source. Marks the payload consumed; later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.consumed {
            return Ok(());
        }
        self.consumed = true;
        match &mut self.body {
            PayloadBody::Stream { source, .. } => source.close()?,
            PayloadBody::Multipart(writer) => writer.close()?,
            PayloadBody::Bytes(_) | PayloadBody::Text(_) => {}
        }
        Ok(())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::text(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::text(text)
    }
}

impl From<&[u8]> for Payload {
    fn from(data: &[u8]) -> Self {
        Payload::bytes(Bytes::copy_from_slice(data))
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(data: &[u8; N]) -> Self {
        Payload::bytes(Bytes::copy_from_slice(data))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::bytes(data)
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::bytes(data)
    }
}

impl From<Box<dyn StreamSource>> for Payload {
    fn from(source: Box<dyn StreamSource>) -> Self {
        Payload::boxed_stream(source)
    }
}

impl From<MultipartWriter> for Payload {
    fn from(writer: MultipartWriter) -> Self {
        Payload::multipart(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_content_types() {
        assert_eq!(Payload::from("x").content_type(), Some(TEXT_PLAIN_UTF8));
        assert_eq!(Payload::from(&b"x"[..]).content_type(), Some(OCTET_STREAM));
        assert_eq!(Payload::from(vec![1u8, 2]).content_type(), Some(OCTET_STREAM));
        assert_eq!(Payload::json(&json!({"a": 1})).unwrap().content_type(), Some(APPLICATION_JSON));
        assert_eq!(Payload::form(&[("a", "b")]).content_type(), Some(FORM_URLENCODED));
        assert_eq!(
            Payload::stream(io::Cursor::new(b"abc".to_vec())).content_type(),
            Some(OCTET_STREAM)
        );
    }

    #[test]
    fn merged_headers_replace_defaults() {
        let mut payload = Payload::text("hi");
        let overrides: Headers = [("content-type", "text/html; charset=utf-8"), ("X-Extra", "1")]
            .into_iter()
            .collect();
        payload.merge_headers(&overrides);
        assert_eq!(payload.headers().len(), 2);
        assert_eq!(payload.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(payload.headers().get("x-extra"), Some("1"));
    }

    #[test]
    fn sizes() {
        assert_eq!(Payload::text("Привет").size(), Some(12));
        assert_eq!(Payload::json(&json!({"test": "passed"})).unwrap().size(), Some(17));
        let mut cursor = io::Cursor::new(b"0123456789".to_vec());
        cursor.set_position(4);
        assert_eq!(Payload::stream(cursor).size(), Some(6));
    }

    #[test]
    fn content_disposition_quoting() {
        let mut payload = Payload::bytes(Bytes::from_static(b"data"));
        payload.set_content_disposition("attachment", &[("filename", "my \"file\".txt")]);
        assert_eq!(
            payload.headers().get(CONTENT_DISPOSITION),
            Some("attachment; filename=\"my \\\"file\\\".txt\"")
        );
        payload.set_content_disposition("attachment", &[("filename", "naïve.txt")]);
        assert_eq!(
            payload.headers().get(CONTENT_DISPOSITION),
            Some("attachment; filename*=utf-8''na%C3%AFve.txt")
        );
    }

    #[tokio::test]
    async fn stream_rewinds_to_first_position() {
        let mut cursor = io::Cursor::new(b"skip:payload".to_vec());
        cursor.set_position(5);
        let mut payload = Payload::stream(cursor);
        let mut first = Vec::new();
        payload.write_to(&mut first).await.unwrap();
        let mut second = Vec::new();
        payload.write_to(&mut second).await.unwrap();
        assert_eq!(first, b"payload");
        assert_eq!(second, b"payload");
        assert_eq!(payload.size(), Some(7));
    }

    #[test]
    fn close_is_idempotent() {
        let mut payload = Payload::stream(io::Cursor::new(Vec::<u8>::new()));
        assert!(!payload.autoclose());
        payload.close().unwrap();
        assert!(payload.is_consumed());
        payload.close().unwrap();
        assert!(Payload::text("x").autoclose());
    }
}
