/*
 * quoted_printable.rs
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

//! Quoted-Printable codec for Content-Transfer-Encoding (RFC 2045 section 6.7).

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i = i.wrapping_add(1);
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i = i.wrapping_add(1);
    }
    t
};

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Encoded lines stop one short of 76 so the soft break `=` fits.
const MAX_LINE: usize = 75;

/// Decode quoted-printable from `src`, appending to `out`. Handles =XX and soft line
/// breaks (=CRLF, =LF). An incomplete `=` escape at the end is left unconsumed unless
/// `end_of_stream`. Returns number of bytes consumed from src.
pub fn decode(src: &[u8], out: &mut Vec<u8>, end_of_stream: bool) -> usize {
    let mut pos = 0;
    while pos < src.len() {
        let b = src[pos];
        if b != b'=' {
            out.push(b);
            pos += 1;
            continue;
        }
        let remaining = src.len() - pos;
        if remaining >= 3 {
            let hex1 = src[pos + 1];
            let hex2 = src[pos + 2];
            let v1 = HEX_DECODE[hex1 as usize];
            let v2 = HEX_DECODE[hex2 as usize];
            if v1 >= 0 && v2 >= 0 {
                out.push(((v1 << 4) | v2) as u8);
                pos += 3;
                continue;
            }
            if hex1 == b'\r' && hex2 == b'\n' {
                pos += 3;
                continue;
            }
            if hex1 == b'\n' {
                pos += 2;
                continue;
            }
            out.push(b);
            pos += 1;
        } else if remaining == 2 && src[pos + 1] == b'\n' {
            pos += 2;
        } else if end_of_stream {
            out.push(b);
            pos += 1;
        } else {
            break;
        }
    }
    pos
}

/// Decode a complete quoted-printable body.
pub fn decode_all(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    decode(src, &mut out, true);
    out
}

/// Streaming quoted-printable encoder. Line breaks in the input are kept; long
/// lines get soft breaks; whitespace before a line break is escaped.
#[derive(Debug, Default)]
pub struct Encoder {
    column: usize,
    pending_space: Option<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, src: &[u8], out: &mut Vec<u8>) {
        for &b in src {
            if let Some(ws) = self.pending_space.take() {
                if b == b'\r' || b == b'\n' {
                    self.push_escaped(ws, out);
                } else {
                    self.push_literal(ws, out);
                }
            }
            match b {
                b'\n' => {
                    out.push(b'\n');
                    self.column = 0;
                }
                b'\r' => out.push(b'\r'),
                b' ' | b'\t' => self.pending_space = Some(b),
                33..=126 if b != b'=' => self.push_literal(b, out),
                _ => self.push_escaped(b, out),
            }
        }
    }

    /// Flush held-back trailing whitespace.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if let Some(ws) = self.pending_space.take() {
            self.push_escaped(ws, out);
        }
        self.column = 0;
    }

    fn soft_break(&mut self, width: usize, out: &mut Vec<u8>) {
        if self.column + width > MAX_LINE {
            out.extend_from_slice(b"=\r\n");
            self.column = 0;
        }
    }

    fn push_literal(&mut self, b: u8, out: &mut Vec<u8>) {
        self.soft_break(1, out);
        out.push(b);
        self.column += 1;
    }

    fn push_escaped(&mut self, b: u8, out: &mut Vec<u8>) {
        self.soft_break(3, out);
        out.push(b'=');
        out.push(HEX_UPPER[(b >> 4) as usize]);
        out.push(HEX_UPPER[(b & 0x0f) as usize]);
        self.column += 3;
    }
}

/// Encode a complete body.
pub fn encode_all(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut encoder = Encoder::new();
    encoder.encode(src, &mut out);
    encoder.finish(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_cyrillic() {
        let out = decode_all(b"=D0=9F=D1=80=D0=B8=D0=B2=D0=B5=D1=82, =D0=BC=D0=B8=D1=80!");
        assert_eq!(out, "Привет, мир!".as_bytes());
    }

    #[test]
    fn decode_soft_breaks() {
        assert_eq!(decode_all(b"foo=\r\nbar=\nbaz"), b"foobarbaz");
    }

    #[test]
    fn incomplete_escape_left_unconsumed() {
        let mut out = Vec::new();
        let n = decode(b"ab=D", &mut out, false);
        assert_eq!(n, 2);
        assert_eq!(out, b"ab");
    }

    #[test]
    fn encode_cyrillic() {
        assert_eq!(
            encode_all("Привет, мир!".as_bytes()),
            b"=D0=9F=D1=80=D0=B8=D0=B2=D0=B5=D1=82, =D0=BC=D0=B8=D1=80!".to_vec()
        );
    }

    #[test]
    fn encode_escapes_equals_and_trailing_space() {
        assert_eq!(encode_all(b"a=b \r\nc\t"), b"a=3Db=20\r\nc=09".to_vec());
    }

    #[test]
    fn encode_soft_breaks_long_lines() {
        let input = vec![b'x'; 200];
        let encoded = encode_all(&input);
        assert!(encoded.split(|&b| b == b'\n').all(|line| line.len() <= 77));
        assert_eq!(decode_all(&encoded), input);
    }

    #[test]
    fn encode_across_chunks() {
        let mut encoder = Encoder::new();
        let mut out = Vec::new();
        encoder.encode(b"end ", &mut out);
        encoder.encode(b"\r\nnext", &mut out);
        encoder.finish(&mut out);
        assert_eq!(out, b"end=20\r\nnext".to_vec());
    }
}
