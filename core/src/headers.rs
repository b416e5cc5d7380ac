/*
 * headers.rs
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

//! Header block: ordered, case-insensitive name/value list (RFC 5322 section 2.2).

use std::fmt;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";

/// Ordered header list. Lookups ignore ASCII case; names keep the case they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Set `name` to `value`: the first occurrence is replaced in place and later
    /// duplicates are dropped; a new name goes to the end.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(i) => {
                self.entries[i].1 = value;
                let mut j = i + 1;
                while j < self.entries.len() {
                    if self.entries[j].0.eq_ignore_ascii_case(&name) {
                        self.entries.remove(j);
                    } else {
                        j += 1;
                    }
                }
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Add a value without touching existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Remove every occurrence; returns the first removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let mut first = None;
        self.entries.retain(|(n, v)| {
            if n.eq_ignore_ascii_case(name) {
                if first.is_none() {
                    first = Some(v.clone());
                }
                false
            } else {
                true
            }
        });
        first
    }

    /// `insert` every entry of `other`, in order.
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse raw header lines (line endings optional). Lines starting with SP or HT
    /// continue the previous value; lines without a colon are skipped.
    pub fn from_lines<I, B>(lines: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut headers = Headers::new();
        for line in lines {
            let line = trim_crlf(line.as_ref());
            if line.is_empty() {
                continue;
            }
            if matches!(line[0], b' ' | b'\t') {
                if let Some((_, value)) = headers.entries.last_mut() {
                    let cont = String::from_utf8_lossy(line);
                    value.push(' ');
                    value.push_str(cont.trim());
                }
                continue;
            }
            if let Some((name, value)) = split_header(line) {
                let name = String::from_utf8_lossy(name).trim().to_string();
                let value = String::from_utf8_lossy(value).trim().to_string();
                headers.entries.push((name, value));
            }
        }
        headers
    }

    /// Serialised block: `Name: value\r\n` per entry followed by the blank line.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in self.iter() {
            append_header(&mut out, name, value);
        }
        out.extend_from_slice(b"\r\n");
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

fn append_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Strip one trailing CRLF, LF or CR.
pub(crate) fn trim_crlf(s: &[u8]) -> &[u8] {
    let mut end = s.len();
    if end >= 2 && s[end - 2] == b'\r' && s[end - 1] == b'\n' {
        end -= 2;
    } else if end >= 1 && (s[end - 1] == b'\n' || s[end - 1] == b'\r') {
        end -= 1;
    }
    &s[..end]
}

fn split_header(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    if colon == 0 {
        return None;
    }
    Some((&line[..colon], &line[colon + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let h: Headers = [("Content-Type", "text/plain"), ("X-Foo", "bar")].into_iter().collect();
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("X-FOO"), Some("bar"));
        assert!(h.contains("x-foo"));
        assert_eq!(h.get("missing"), None);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut h: Headers = [("A", "1"), ("B", "2"), ("a", "3")].into_iter().collect();
        h.insert("a", "x");
        assert_eq!(h.iter().collect::<Vec<_>>(), vec![("A", "x"), ("B", "2")]);
        h.insert("C", "4");
        assert_eq!(h.iter().last(), Some(("C", "4")));
    }

    #[test]
    fn append_keeps_duplicates() {
        let mut h = Headers::new();
        h.append("Via", "a");
        h.append("via", "b");
        assert_eq!(h.get_all("VIA").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(h.remove("via").as_deref(), Some("a"));
        assert!(h.is_empty());
    }

    #[test]
    fn parse_block_with_folding() {
        let lines: Vec<&[u8]> = vec![
            b"Content-Type: multipart/mixed;\r\n",
            b"\tboundary=\"sep\"\r\n",
            b"garbage line\r\n",
            b"Content-Length:  12 \r\n",
        ];
        let h = Headers::from_lines(lines);
        assert_eq!(h.len(), 2);
        assert_eq!(h.get("content-type"), Some("multipart/mixed; boundary=\"sep\""));
        assert_eq!(h.get("content-length"), Some("12"));
    }

    #[test]
    fn serialise_block() {
        let h: Headers = [("Content-Type", "text/plain"), ("Content-Length", "3")].into_iter().collect();
        assert_eq!(h.to_bytes(), b"Content-Type: text/plain\r\nContent-Length: 3\r\n\r\n");
        assert_eq!(Headers::new().to_bytes(), b"\r\n");
    }
}
