/*
 * reader.rs
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

//! Envelope reader (RFC 2046 section 5.1). Produces one part at a time; asking for
//! the next part releases the previous one, so at most one part reads the stream.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::BytesMut;
use log::{debug, trace};
use tokio::io::AsyncRead;
use tokio::sync::Mutex;

use super::boundary::{rstrip, BoundaryLine, BoundaryScanner};
use super::part::BodyPartReader;
use crate::config::MultipartConfig;
use crate::error::{MultipartError, Result};
use crate::headers::{Headers, CONTENT_TYPE};
use crate::mime::{parse_content_type, validate_boundary};
use crate::stream::SharedStream;

/// What a sub-part's headers call for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Leaf,
    Nested,
}

/// Chooses between a body part and a nested envelope for each sub-part.
/// Any `Fn(&Headers) -> PartKind` is a dispatch strategy.
pub trait PartDispatch: Send + Sync {
    fn dispatch(&self, headers: &Headers) -> PartKind;
}

impl<F> PartDispatch for F
where
    F: Fn(&Headers) -> PartKind + Send + Sync,
{
    fn dispatch(&self, headers: &Headers) -> PartKind {
        self(headers)
    }
}

/// Default strategy: `multipart/*` parts are nested envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartDispatch;

impl PartDispatch for MultipartDispatch {
    fn dispatch(&self, headers: &Headers) -> PartKind {
        match headers.get(CONTENT_TYPE).and_then(parse_content_type) {
            Some(ct) if ct.is_multipart() => PartKind::Nested,
            _ => PartKind::Leaf,
        }
    }
}

/// A part handed out by [`MultipartReader::next`].
pub enum Part<R> {
    Body(BodyPartReader<R>),
    Multipart(MultipartReader<R>),
}

impl<R> Clone for Part<R> {
    fn clone(&self) -> Self {
        match self {
            Part::Body(body) => Part::Body(body.clone()),
            Part::Multipart(reader) => Part::Multipart(reader.clone()),
        }
    }
}

impl<R> std::fmt::Debug for Part<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Part::Body(body) => f.debug_tuple("Body").field(body).finish(),
            Part::Multipart(reader) => f.debug_tuple("Multipart").field(&reader.boundary()).finish(),
        }
    }
}

impl<R> Part<R> {
    pub fn headers(&self) -> &Headers {
        match self {
            Part::Body(body) => body.headers(),
            Part::Multipart(reader) => reader.headers(),
        }
    }

    pub fn at_eof(&self) -> bool {
        match self {
            Part::Body(body) => body.at_eof(),
            Part::Multipart(reader) => reader.at_eof(),
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Part::Multipart(_))
    }

    pub fn into_body(self) -> Option<BodyPartReader<R>> {
        match self {
            Part::Body(body) => Some(body),
            Part::Multipart(_) => None,
        }
    }

    pub fn into_multipart(self) -> Option<MultipartReader<R>> {
        match self {
            Part::Multipart(reader) => Some(reader),
            Part::Body(_) => None,
        }
    }
}

impl<R: AsyncRead + Unpin + Send> Part<R> {
    pub async fn release(&self) -> Result<()> {
        match self {
            Part::Body(body) => body.release().await,
            Part::Multipart(reader) => reader.release().await,
        }
    }
}

struct ReaderInner {
    headers: Headers,
    boundary: String,
    subtype: String,
    scanner: BoundaryScanner,
    default_charset: OnceLock<String>,
    eof: AtomicBool,
}

struct ReaderState<R> {
    last_part: Option<Part<R>>,
    at_bof: bool,
    first_part: bool,
}

/// Reader for one multipart envelope over a shared stream.
///
/// Clones are handles to the same envelope. Nested envelopes are readers over
/// the same stream with their own boundary; they inherit configuration and
/// dispatch strategy.
pub struct MultipartReader<R> {
    inner: Arc<ReaderInner>,
    state: Arc<Mutex<ReaderState<R>>>,
    stream: SharedStream<R>,
    dispatch: Arc<dyn PartDispatch>,
    config: MultipartConfig,
}

impl<R> std::fmt::Debug for MultipartReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartReader").finish_non_exhaustive()
    }
}

impl<R> Clone for MultipartReader<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            state: Arc::clone(&self.state),
            stream: self.stream.clone(),
            dispatch: Arc::clone(&self.dispatch),
            config: self.config.clone(),
        }
    }
}

impl<R> MultipartReader<R> {
    /// Envelope headers (the ones carrying the boundary).
    pub fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    pub fn boundary(&self) -> &str {
        &self.inner.boundary
    }

    /// True once the terminal boundary has been read.
    pub fn at_eof(&self) -> bool {
        self.inner.eof.load(Ordering::Acquire)
    }

    /// Charset announced by a leading `_charset_` form field.
    pub fn default_charset(&self) -> Option<&str> {
        self.inner.default_charset.get().map(String::as_str)
    }

    pub(crate) fn stream(&self) -> &SharedStream<R> {
        &self.stream
    }

    fn mark_eof(&self) {
        self.inner.eof.store(true, Ordering::Release);
        debug!("multipart envelope {:?} complete", self.inner.boundary);
    }

    fn is_form_data(&self) -> bool {
        self.inner.subtype == "form-data"
    }
}

impl<R: AsyncRead + Unpin + Send> MultipartReader<R> {
    pub fn new(headers: Headers, stream: SharedStream<R>) -> Result<Self> {
        Self::with_config(headers, stream, MultipartConfig::default())
    }

    /// Fails unless Content-Type is `multipart/*` with a usable boundary.
    pub fn with_config(headers: Headers, stream: SharedStream<R>, config: MultipartConfig) -> Result<Self> {
        let value = headers.get(CONTENT_TYPE).unwrap_or("");
        let content_type = parse_content_type(value)
            .filter(|ct| ct.is_multipart())
            .ok_or_else(|| MultipartError::NotMultipart(value.to_string()))?;
        let boundary = content_type
            .boundary()
            .ok_or_else(|| MultipartError::MissingBoundary(value.to_string()))?
            .to_string();
        validate_boundary(&boundary, config.get_max_boundary_len()).map_err(|reason| {
            MultipartError::InvalidBoundary {
                boundary: boundary.clone(),
                reason,
            }
        })?;
        let subtype = content_type.get_sub_type().to_string();
        let inner = ReaderInner {
            scanner: BoundaryScanner::new(&boundary),
            boundary,
            subtype,
            headers,
            default_charset: OnceLock::new(),
            eof: AtomicBool::new(false),
        };
        Ok(Self {
            inner: Arc::new(inner),
            state: Arc::new(Mutex::new(ReaderState {
                last_part: None,
                at_bof: true,
                first_part: true,
            })),
            stream,
            dispatch: Arc::new(MultipartDispatch),
            config,
        })
    }

    /// Replace the dispatch strategy. Nested readers created afterwards inherit it.
    pub fn with_dispatch(mut self, dispatch: Arc<dyn PartDispatch>) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Next part, or `None` after the terminal boundary. The previous part is
    /// released first, whether or not the caller finished it.
    pub async fn next(&self) -> Result<Option<Part<R>>> {
        let mut state = self.state.lock().await;
        if self.at_eof() {
            return Ok(None);
        }
        if let Some(last) = state.last_part.take() {
            last.release().await?;
        }
        if state.at_bof {
            self.read_until_first_boundary().await?;
            state.at_bof = false;
        } else {
            self.read_boundary().await?;
        }
        if self.at_eof() {
            return Ok(None);
        }

        let mut part = self.fetch_next_part().await?;
        if state.first_part && self.is_form_data() {
            state.first_part = false;
            // RFC 7578 section 4.6
            if let Part::Body(body) = &part {
                if body.name() == Some("_charset_") {
                    self.read_default_charset(body).await?;
                    self.read_boundary().await?;
                    if self.at_eof() {
                        return Ok(None);
                    }
                    part = self.fetch_next_part().await?;
                }
            }
        }
        state.first_part = false;
        state.last_part = Some(part.clone());
        Ok(Some(part))
    }

    /// Drain the envelope through its terminal boundary. No-op once at eof.
    pub async fn release(&self) -> Result<()> {
        self.drain().await
    }

    // boxed: a nested reader is released from inside its parent's next()
    fn drain(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            while self.next().await?.is_some() {}
            Ok(())
        })
    }

    /// Reader for a sub-part with these headers, as chosen by the dispatch strategy.
    pub fn get_part_reader(&self, headers: Headers) -> Result<Part<R>> {
        match self.dispatch.dispatch(&headers) {
            PartKind::Nested => {
                let nested = MultipartReader::with_config(headers, self.stream.clone(), self.config.clone())?
                    .with_dispatch(Arc::clone(&self.dispatch));
                debug!("nested envelope {:?} in {:?}", nested.boundary(), self.inner.boundary);
                Ok(Part::Multipart(nested))
            }
            PartKind::Leaf => Ok(Part::Body(BodyPartReader::with_options(
                &self.inner.boundary,
                headers,
                self.stream.clone(),
                &self.inner.subtype,
                self.inner.default_charset.get().cloned(),
                &self.config,
            ))),
        }
    }

    async fn read_until_first_boundary(&self) -> Result<()> {
        let mut stream = self.stream.lock().await;
        loop {
            let line = stream.readline().await?;
            if line.is_empty() {
                return Err(MultipartError::NoStartingBoundary(self.inner.boundary.clone()));
            }
            match self.inner.scanner.classify(&line) {
                BoundaryLine::Separator => return Ok(()),
                BoundaryLine::Terminal => {
                    self.mark_eof();
                    return Ok(());
                }
                BoundaryLine::Content => trace!("skipping prelude line ({} bytes)", line.len()),
            }
        }
    }

    async fn read_boundary(&self) -> Result<()> {
        let mut stream = self.stream.lock().await;
        let line = stream.readline().await?;
        match self.inner.scanner.classify(&line) {
            BoundaryLine::Separator => Ok(()),
            BoundaryLine::Terminal => {
                self.mark_eof();
                // A delimiter line right after the terminal one belongs to the
                // parent. Otherwise the line is an epilogue, dropped only when the
                // parent's delimiter follows it.
                let epilogue = stream.readline().await?;
                if epilogue.starts_with(b"--") {
                    stream.unread_data(&epilogue);
                    return Ok(());
                }
                let next_line = stream.readline().await?;
                stream.unread_data(&next_line);
                if !next_line.starts_with(b"--") {
                    stream.unread_data(&epilogue);
                }
                Ok(())
            }
            BoundaryLine::Content => Err(MultipartError::UnexpectedBoundary {
                found: String::from_utf8_lossy(rstrip(&line)).into_owned(),
                expected: String::from_utf8_lossy(self.inner.scanner.delimiter()).into_owned(),
            }),
        }
    }

    async fn read_headers(&self) -> Result<Headers> {
        let mut stream = self.stream.lock().await;
        let mut lines = Vec::new();
        loop {
            let line = stream.readline().await?;
            if rstrip(&line).is_empty() {
                break;
            }
            lines.push(line);
        }
        Ok(Headers::from_lines(lines))
    }

    async fn fetch_next_part(&self) -> Result<Part<R>> {
        let headers = self.read_headers().await?;
        self.get_part_reader(headers)
    }

    async fn read_default_charset(&self, body: &BodyPartReader<R>) -> Result<()> {
        let limit = self.config.get_max_charset_len();
        let size = (limit + 1).max(self.inner.scanner.window_len());
        let mut value = BytesMut::new();
        while !body.at_eof() {
            value.extend_from_slice(&body.read_chunk(size).await?);
            if value.len() > limit {
                return Err(MultipartError::InvalidDefaultCharset);
            }
        }
        let charset = std::str::from_utf8(&value)
            .map_err(|_| MultipartError::InvalidDefaultCharset)?
            .trim()
            .to_string();
        debug!("default charset {:?} for {:?}", charset, self.inner.boundary);
        if self.inner.default_charset.set(charset).is_err() {
            debug!("default charset for {:?} already set", self.inner.boundary);
        }
        Ok(())
    }
}
