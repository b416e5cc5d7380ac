/*
 * charset.rs
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

//! Charset resolution and decoding (WHATWG labels), application/x-www-form-urlencoded.

use encoding_rs::Encoding;
use percent_encoding::{percent_decode, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{MultipartError, Result};

/// application/x-www-form-urlencoded byte set; space is handled separately as `+`.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

/// RFC 5987 attr-char complement.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

pub fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| MultipartError::UnknownCharset(label.to_string()))
}

/// Strict decode: malformed input is an error, never replaced.
pub fn decode_text(data: &[u8], label: &str) -> Result<String> {
    let encoding = lookup(label)?;
    encoding
        .decode_without_bom_handling_and_without_replacement(data)
        .map(|text| text.into_owned())
        .ok_or_else(|| MultipartError::Undecodable(label.to_string()))
}

/// Parse form data. Blank values are kept; a field without `=` has an empty value.
/// Percent-escapes are decoded in `label`.
pub fn parse_form(text: &str, label: &str) -> Result<Vec<(String, String)>> {
    let encoding = lookup(label)?;
    let decode = |s: &str| -> String {
        let plus = s.replace('+', " ");
        let bytes: Vec<u8> = percent_decode(plus.as_bytes()).collect();
        encoding.decode_without_bom_handling(&bytes).0.into_owned()
    };
    Ok(text
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (decode(name), decode(value)),
            None => (decode(pair), String::new()),
        })
        .collect())
}

/// Serialise name/value pairs as application/x-www-form-urlencoded (UTF-8).
pub fn encode_form<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> String {
    let encode = |s: &str| {
        s.split(' ')
            .map(|piece| utf8_percent_encode(piece, FORM).to_string())
            .collect::<Vec<_>>()
            .join("+")
    };
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", encode(name.as_ref()), encode(value.as_ref())))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode a UTF-8 parameter value for the RFC 5987 `name*=utf-8''...` form.
pub fn percent_encode_ext(value: &str) -> String {
    utf8_percent_encode(value, ATTR_CHAR).to_string()
}
