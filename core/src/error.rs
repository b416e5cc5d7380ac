/*
 * error.rs
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

//! Multipart reader and writer errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MultipartError>;

/// Errors from reading or writing a multipart envelope.
///
/// Everything except `Io` leaves the envelope unusable: the stream position is
/// unspecified afterwards and the caller should drop the underlying connection.
#[derive(Error, Debug)]
pub enum MultipartError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Envelope Content-Type has no boundary parameter.
    #[error("missing boundary in Content-Type {0:?}")]
    MissingBoundary(String),
    #[error("invalid boundary {boundary:?}: {reason}")]
    InvalidBoundary { boundary: String, reason: &'static str },
    #[error("not a multipart Content-Type: {0:?}")]
    NotMultipart(String),
    /// Stream ended before the first boundary line.
    #[error("could not find starting boundary {0:?}")]
    NoStartingBoundary(String),
    #[error("invalid boundary {found:?}, expected {expected:?}")]
    UnexpectedBoundary { found: String, expected: String },
    /// Stream ended inside a part, before its closing boundary.
    #[error("unexpected end of stream while looking for boundary {0:?}")]
    UnexpectedEof(String),
    #[error("reader did not read all the data or it is malformed")]
    MalformedPart,
    #[error("Invalid default charset")]
    InvalidDefaultCharset,
    #[error("unknown content encoding: {0}")]
    UnknownContentEncoding(String),
    #[error("unknown content transfer encoding: {0}")]
    UnknownTransferEncoding(String),
    #[error("unknown charset: {0}")]
    UnknownCharset(String),
    /// Body bytes are not valid in the resolved charset.
    #[error("data cannot be decoded with {0} encoding")]
    Undecodable(String),
    #[error("chunk size {size} is smaller than boundary length {boundary_len}")]
    ChunkTooSmall { size: usize, boundary_len: usize },
    /// `from_response` on a response whose body was already taken.
    #[error("response body already consumed")]
    BodyConsumed,
    /// form-data parts may not carry this header (RFC 7578 sections 4.7, 4.8).
    #[error("form-data part must not set {0}")]
    FormDataHeader(&'static str),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}
