/*
 * content_type.rs
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

//! Content-Type header (RFC 2045).

use super::parameter::{decode_extended_value, Parameter};
use super::utils::is_token;

#[derive(Debug, Clone)]
pub struct ContentType {
    primary_type: String,
    sub_type: String,
    parameters: Vec<Parameter>,
}

impl ContentType {
    pub fn new(
        primary_type: impl Into<String>,
        sub_type: impl Into<String>,
        parameters: Option<Vec<Parameter>>,
    ) -> Self {
        Self {
            primary_type: primary_type.into(),
            sub_type: sub_type.into(),
            parameters: parameters.unwrap_or_default(),
        }
    }

    pub fn get_sub_type(&self) -> &str {
        &self.sub_type
    }

    pub fn is_primary_type(&self, t: &str) -> bool {
        self.primary_type.eq_ignore_ascii_case(t)
    }

    pub fn is_sub_type(&self, t: &str) -> bool {
        self.sub_type.eq_ignore_ascii_case(t)
    }

    pub fn is_mime_type(&self, primary: &str, sub: &str) -> bool {
        self.is_primary_type(primary) && self.is_sub_type(sub)
    }

    pub fn is_multipart(&self) -> bool {
        self.is_primary_type("multipart")
    }

    /// Parameter value by case-insensitive name.
    pub fn get_parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.get_name().eq_ignore_ascii_case(name))
            .map(Parameter::get_value)
    }

    pub fn charset(&self) -> Option<&str> {
        self.get_parameter("charset")
    }

    pub fn boundary(&self) -> Option<&str> {
        self.get_parameter("boundary")
    }
}

/// Parse Content-Type header value.
pub fn parse_content_type(value: &str) -> Option<ContentType> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (type_part, params_part) = match value.find(';') {
        Some(i) => {
            let (a, b) = value.split_at(i);
            (a.trim(), b[1..].trim())
        }
        None => (value, ""),
    };
    let slash = type_part.find('/')?;
    let primary = type_part[..slash].trim().to_ascii_lowercase();
    let sub = type_part[slash + 1..].trim().to_ascii_lowercase();
    if !is_token(&primary) || !is_token(&sub) {
        return None;
    }
    let parameters = parse_parameter_list(params_part);
    Some(ContentType::new(primary, sub, parameters))
}

/// Parse semicolon-separated parameter list (name=value; name="value"; name*=charset''value).
/// Names are lower-cased. Unquoted values run to the next `;` and are taken as-is,
/// so real-world boundaries such as `--:--` survive. An RFC 2231 `name*` value
/// replaces a plain `name` value.
pub fn parse_parameter_list(params_part: &str) -> Option<Vec<Parameter>> {
    let params_part = params_part.trim();
    if params_part.is_empty() {
        return None;
    }
    let mut parameters: Vec<Parameter> = Vec::new();
    let mut extended: Vec<String> = Vec::new();
    let mut pos = 0;
    let bytes = params_part.as_bytes();
    let len = bytes.len();

    while pos < len {
        while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        let semi = bytes[pos..].iter().position(|&b| b == b';').map(|i| pos + i).unwrap_or(len);
        let eq = match bytes[pos..semi].iter().position(|&b| b == b'=') {
            Some(i) => pos + i,
            None => {
                pos = semi;
                continue;
            }
        };
        let raw_name = params_part[pos..eq].trim().to_ascii_lowercase();
        let (name, is_extended) = match raw_name.strip_suffix('*') {
            Some(n) => (n.to_string(), true),
            None => (raw_name, false),
        };
        pos = eq + 1;
        while pos < len && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let value = if pos < len && bytes[pos] == b'"' {
            pos += 1;
            let mut v = Vec::new();
            while pos < len {
                let c = bytes[pos];
                if c == b'\\' && pos + 1 < len {
                    v.push(bytes[pos + 1]);
                    pos += 2;
                } else if c == b'"' {
                    pos += 1;
                    break;
                } else {
                    v.push(c);
                    pos += 1;
                }
            }
            // skip anything between the closing quote and the next separator
            while pos < len && bytes[pos] != b';' {
                pos += 1;
            }
            String::from_utf8_lossy(&v).into_owned()
        } else {
            let end = bytes[pos..].iter().position(|&b| b == b';').map(|i| pos + i).unwrap_or(len);
            let v = params_part[pos..end].trim().to_string();
            pos = end;
            v
        };
        if !is_token(&name) {
            continue;
        }
        if is_extended {
            parameters.retain(|p| p.get_name() != name);
            extended.push(name.clone());
            parameters.push(Parameter::new(name, decode_extended_value(&value)));
        } else if !extended.contains(&name) {
            parameters.push(Parameter::new(name, value));
        }
    }
    if parameters.is_empty() {
        None
    } else {
        Some(parameters)
    }
}
