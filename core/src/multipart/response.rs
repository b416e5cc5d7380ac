/*
 * response.rs
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

//! Reading a multipart envelope straight off an HTTP response, handing the
//! connection back once the envelope is exhausted.

use std::future::Future;
use std::io;

use log::debug;
use tokio::io::AsyncRead;

use super::reader::{MultipartReader, Part};
use crate::error::{MultipartError, Result};
use crate::headers::Headers;
use crate::stream::SharedStream;

/// The parts of an HTTP response a multipart reader needs.
pub trait MultipartResponse: Send {
    type Body: AsyncRead + Unpin + Send;

    fn headers(&self) -> &Headers;

    /// The body stream; `None` once taken.
    fn take_body(&mut self) -> Option<Self::Body>;

    /// Return the connection to its owner (pool or close).
    fn release(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Envelope reader bound to the response that carries it.
pub struct MultipartResponseWrapper<Resp: MultipartResponse> {
    response: Resp,
    reader: MultipartReader<Resp::Body>,
    released: bool,
}

impl<Resp: MultipartResponse> MultipartResponseWrapper<Resp> {
    pub fn reader(&self) -> &MultipartReader<Resp::Body> {
        &self.reader
    }

    pub fn response(&self) -> &Resp {
        &self.response
    }

    /// Underlying body stream fully consumed.
    pub async fn at_eof(&self) -> bool {
        self.reader.stream().at_eof().await
    }

    /// Next part; the response is released as soon as the envelope is exhausted.
    pub async fn next(&mut self) -> Result<Option<Part<Resp::Body>>> {
        let item = self.reader.next().await?;
        if self.reader.at_eof() {
            self.release().await?;
        }
        Ok(item)
    }

    /// Release the response. Only the first call reaches it.
    pub async fn release(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            self.response.release().await?;
            debug!("multipart response released");
        }
        Ok(())
    }
}

impl<R: AsyncRead + Unpin + Send> MultipartReader<R> {
    /// Reader over a response body. Fails unless the response is `multipart/*`
    /// with a usable boundary, or if its body was already taken.
    pub fn from_response<Resp>(mut response: Resp) -> Result<MultipartResponseWrapper<Resp>>
    where
        Resp: MultipartResponse<Body = R>,
    {
        let body = response.take_body().ok_or(MultipartError::BodyConsumed)?;
        let reader = MultipartReader::new(response.headers().clone(), SharedStream::new(body))?;
        Ok(MultipartResponseWrapper {
            response,
            reader,
            released: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeResponse {
        headers: Headers,
        body: Option<Cursor<Vec<u8>>>,
        releases: Arc<AtomicUsize>,
    }

    impl FakeResponse {
        fn new(content_type: &str, body: &[u8]) -> (Self, Arc<AtomicUsize>) {
            let releases = Arc::new(AtomicUsize::new(0));
            let response = FakeResponse {
                headers: [("Content-Type", content_type)].into_iter().collect(),
                body: Some(Cursor::new(body.to_vec())),
                releases: Arc::clone(&releases),
            };
            (response, releases)
        }
    }

    impl MultipartResponse for FakeResponse {
        type Body = Cursor<Vec<u8>>;

        fn headers(&self) -> &Headers {
            &self.headers
        }

        fn take_body(&mut self) -> Option<Self::Body> {
            self.body.take()
        }

        fn release(&mut self) -> impl Future<Output = io::Result<()>> + Send {
            let releases = Arc::clone(&self.releases);
            async move {
                releases.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn releases_response_at_end() {
        let (response, releases) =
            FakeResponse::new("multipart/related;boundary=\":\"", b"--:\r\n\r\ntest\r\n--:--\r\n");
        let mut wrapper = MultipartReader::from_response(response).unwrap();
        let part = wrapper.next().await.unwrap().and_then(Part::into_body).expect("body part");
        assert_eq!(&part.read(false).await.unwrap()[..], b"test");
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        assert!(wrapper.next().await.unwrap().is_none());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(wrapper.at_eof().await);
        wrapper.release().await.unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_non_multipart_response() {
        let (response, _) = FakeResponse::new("text/plain", b"");
        let err = MultipartReader::from_response(response).err().expect("error");
        assert!(matches!(err, MultipartError::NotMultipart(_)));
    }

    #[test]
    fn rejects_consumed_body() {
        let (mut response, _) = FakeResponse::new("multipart/mixed; boundary=x", b"");
        response.body = None;
        let err = MultipartReader::from_response(response).err().expect("error");
        assert!(matches!(err, MultipartError::BodyConsumed));
    }
}
