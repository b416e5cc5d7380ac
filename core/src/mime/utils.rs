/*
 * utils.rs
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

//! MIME token and boundary rules (RFC 2045 token, RFC 2046 boundary, RFC 7230 quoted-string).

/// Checks if a character is valid in an RFC 2045 token.
#[inline]
pub fn is_token_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~'
    )
}

/// Checks if the string is a valid RFC 2045 token (1+ token chars).
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

/// Validates a boundary for use on the wire. Lenient about the character set (any
/// printable ASCII, as seen in practice) but rejects what would corrupt framing.
/// Returns the reason on failure.
pub fn validate_boundary(boundary: &str, max_len: usize) -> Result<(), &'static str> {
    let b = boundary.as_bytes();
    if b.is_empty() {
        return Err("boundary is empty");
    }
    if b.len() > max_len {
        return Err("boundary is too long");
    }
    if !b.is_ascii() {
        return Err("boundary should contain ASCII only chars");
    }
    if b.iter().any(|c| c.is_ascii_control()) {
        return Err("boundary contains control characters");
    }
    if b.last() == Some(&b' ') {
        return Err("boundary ends with a space");
    }
    Ok(())
}

/// Boundary as a Content-Type parameter value: bare when a token, otherwise a
/// quoted-string with `\` and `"` escaped.
pub fn quote_boundary(boundary: &str) -> String {
    if is_token(boundary) {
        return boundary.to_string();
    }
    let mut out = String::with_capacity(boundary.len() + 2);
    out.push('"');
    for c in boundary.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
