/*
 * mod.rs
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

//! Multipart bodies (RFC 2046 section 5.1, RFC 7578): boundary scanning, part and
//! envelope readers, and the envelope writer.

mod boundary;
mod part;
mod payload;
mod reader;
mod response;
mod writer;

pub use boundary::{BoundaryLine, BoundaryScanner};
pub use part::BodyPartReader;
pub use payload::{Payload, PayloadBody, StreamSource};
pub use reader::{MultipartDispatch, MultipartReader, Part, PartDispatch, PartKind};
pub use response::{MultipartResponse, MultipartResponseWrapper};
pub use writer::MultipartWriter;
