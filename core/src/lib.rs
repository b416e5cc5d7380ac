/*
 * lib.rs
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

//! Streaming multipart MIME: pull-model readers over an async byte stream and an
//! envelope writer for the encode direction.

pub mod config;
pub mod error;
pub mod headers;
pub mod mime;
pub mod multipart;
pub mod stream;

pub use config::MultipartConfig;
pub use error::{MultipartError, Result};
pub use headers::Headers;
pub use multipart::{
    BodyPartReader, MultipartDispatch, MultipartReader, MultipartResponse,
    MultipartResponseWrapper, MultipartWriter, Part, PartDispatch, PartKind, Payload,
    PayloadBody, StreamSource,
};
pub use stream::{ContentStream, SharedStream};
