/*
 * config.rs
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

//! Reader and writer tuning: chunk size, boundary and charset limits, base64 line length.

/// Default chunk size for whole-part reads (`read`, `release`).
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// RFC 2046: boundary is 1 to 70 characters.
pub const DEFAULT_MAX_BOUNDARY_LEN: usize = 70;

/// Longest label in the WHATWG encodings list is 19 characters; anything past 31
/// in a `_charset_` field is not a charset.
pub const DEFAULT_MAX_CHARSET_LEN: usize = 31;

/// RFC 2045 section 6.8: encoded lines are at most 76 characters.
pub const DEFAULT_BASE64_LINE_LEN: usize = 76;

/// Configuration shared by a reader and every nested reader it creates.
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    chunk_size: usize,
    max_boundary_len: usize,
    max_charset_len: usize,
    base64_line_len: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_boundary_len: DEFAULT_MAX_BOUNDARY_LEN,
            max_charset_len: DEFAULT_MAX_CHARSET_LEN,
            base64_line_len: DEFAULT_BASE64_LINE_LEN,
        }
    }
}

impl MultipartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunk size used when a part is read or released as a whole.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    #[must_use]
    pub fn max_boundary_len(mut self, len: usize) -> Self {
        self.max_boundary_len = len;
        self
    }

    #[must_use]
    pub fn max_charset_len(mut self, len: usize) -> Self {
        self.max_charset_len = len;
        self
    }

    /// Line length for base64 output; 0 disables wrapping.
    #[must_use]
    pub fn base64_line_len(mut self, len: usize) -> Self {
        self.base64_line_len = len;
        self
    }

    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn get_max_boundary_len(&self) -> usize {
        self.max_boundary_len
    }

    pub fn get_max_charset_len(&self) -> usize {
        self.max_charset_len
    }

    pub fn get_base64_line_len(&self) -> usize {
        self.base64_line_len
    }
}
