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

//! MIME building blocks for multipart bodies: header value parsing, boundary rules,
//! charsets and body codecs.

pub mod charset;
pub mod codec;
mod content_disposition;
mod content_type;
mod parameter;
pub mod quoted_printable;
mod utils;

pub use codec::{BodyDecoder, BodyEncoder, ContentEncoding, TransferEncoding};
pub use content_disposition::{format_content_disposition, parse_content_disposition, ContentDisposition};
pub use content_type::{parse_content_type, parse_parameter_list, ContentType};
pub use parameter::{decode_extended_value, Parameter};
pub use utils::{is_token, is_token_char, quote_boundary, validate_boundary};
