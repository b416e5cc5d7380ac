/*
 * content_disposition.rs
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

//! Content-Disposition header (RFC 2183, RFC 7578 form-data names, RFC 2231 filenames).

use super::content_type::parse_parameter_list;
use super::parameter::Parameter;
use super::utils::is_token;

#[derive(Debug, Clone)]
pub struct ContentDisposition {
    disposition_type: String,
    parameters: Vec<Parameter>,
}

impl ContentDisposition {
    pub fn new(disposition_type: impl Into<String>, parameters: Option<Vec<Parameter>>) -> Self {
        Self {
            disposition_type: disposition_type.into(),
            parameters: parameters.unwrap_or_default(),
        }
    }

    pub fn is_disposition_type(&self, t: &str) -> bool {
        self.disposition_type.eq_ignore_ascii_case(t)
    }

    pub fn get_parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.get_name().eq_ignore_ascii_case(name))
            .map(Parameter::get_value)
    }

    /// form-data field name.
    pub fn name(&self) -> Option<&str> {
        self.get_parameter("name")
    }

    pub fn filename(&self) -> Option<&str> {
        self.get_parameter("filename")
    }
}

pub fn parse_content_disposition(value: &str) -> Option<ContentDisposition> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (disp_part, params_part) = match value.find(';') {
        Some(i) => {
            let (a, b) = value.split_at(i);
            (a.trim(), b[1..].trim())
        }
        None => (value, ""),
    };
    if !is_token(disp_part) {
        return None;
    }
    let parameters = parse_parameter_list(params_part);
    Some(ContentDisposition::new(disp_part.to_ascii_lowercase(), parameters))
}

/// Render a Content-Disposition value: every parameter as a quoted-string, with an
/// RFC 5987 `name*=utf-8''...` form for non-ASCII values.
pub fn format_content_disposition(disposition_type: &str, params: &[(&str, &str)]) -> String {
    let mut out = disposition_type.to_string();
    for (name, value) in params {
        out.push_str("; ");
        out.push_str(name);
        if value.is_ascii() {
            out.push_str("=\"");
            for c in value.chars() {
                if c == '\\' || c == '"' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        } else {
            out.push_str("*=utf-8''");
            out.push_str(&super::charset::percent_encode_ext(value));
        }
    }
    out
}
