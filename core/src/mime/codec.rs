/*
 * codec.rs
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

//! Body codecs: Content-Transfer-Encoding (RFC 2045) then Content-Encoding (RFC 9110)
//! on read, the reverse order on write. Both directions are incremental.

use std::io::Write;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use flate2::write::{DeflateDecoder, DeflateEncoder, GzDecoder, GzEncoder};
use flate2::Compression;

use super::quoted_printable;
use crate::error::{MultipartError, Result};
use crate::headers::{Headers, CONTENT_ENCODING, CONTENT_TRANSFER_ENCODING};

/// Accepts missing padding and stray trailing bits, as mail and form producers emit both.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
    Identity,
}

impl ContentEncoding {
    /// Missing or empty header means identity.
    pub fn from_header(value: Option<&str>) -> Result<Self> {
        let value = value.unwrap_or("").trim();
        if value.is_empty() || value.eq_ignore_ascii_case("identity") {
            Ok(ContentEncoding::Identity)
        } else if value.eq_ignore_ascii_case("gzip") {
            Ok(ContentEncoding::Gzip)
        } else if value.eq_ignore_ascii_case("deflate") {
            Ok(ContentEncoding::Deflate)
        } else {
            Err(MultipartError::UnknownContentEncoding(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Deflate => "deflate",
            ContentEncoding::Identity => "identity",
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == ContentEncoding::Identity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    Base64,
    QuotedPrintable,
    Binary,
    EightBit,
    SevenBit,
}

impl TransferEncoding {
    /// Missing or empty header means binary.
    pub fn from_header(value: Option<&str>) -> Result<Self> {
        let value = value.unwrap_or("").trim();
        match value.to_ascii_lowercase().as_str() {
            "" | "binary" => Ok(TransferEncoding::Binary),
            "base64" => Ok(TransferEncoding::Base64),
            "quoted-printable" => Ok(TransferEncoding::QuotedPrintable),
            "8bit" => Ok(TransferEncoding::EightBit),
            "7bit" => Ok(TransferEncoding::SevenBit),
            _ => Err(MultipartError::UnknownTransferEncoding(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEncoding::Base64 => "base64",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Binary => "binary",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::SevenBit => "7bit",
        }
    }

    /// Binary, 8bit and 7bit leave bytes untouched.
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            TransferEncoding::Binary | TransferEncoding::EightBit | TransferEncoding::SevenBit
        )
    }
}

enum Inflater {
    Gzip(GzDecoder<Vec<u8>>),
    Deflate(DeflateDecoder<Vec<u8>>),
}

impl Inflater {
    fn new(encoding: ContentEncoding) -> Option<Self> {
        match encoding {
            ContentEncoding::Gzip => Some(Inflater::Gzip(GzDecoder::new(Vec::new()))),
            ContentEncoding::Deflate => Some(Inflater::Deflate(DeflateDecoder::new(Vec::new()))),
            ContentEncoding::Identity => None,
        }
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Inflater::Gzip(d) => {
                d.write_all(data)?;
                Ok(std::mem::take(d.get_mut()))
            }
            Inflater::Deflate(d) => {
                d.write_all(data)?;
                Ok(std::mem::take(d.get_mut()))
            }
        }
    }

    fn finish(self) -> std::io::Result<Vec<u8>> {
        match self {
            Inflater::Gzip(d) => d.finish(),
            Inflater::Deflate(d) => d.finish(),
        }
    }
}

/// Incremental body decoder. Base64 quanta split across chunks, dangling
/// quoted-printable escapes and compressor state carry over between calls;
/// `last` flushes everything.
pub struct BodyDecoder {
    transfer: TransferEncoding,
    content: ContentEncoding,
    b64_tail: Vec<u8>,
    qp_tail: Vec<u8>,
    inflater: Option<Inflater>,
}

impl BodyDecoder {
    pub fn new(transfer: TransferEncoding, content: ContentEncoding) -> Self {
        Self {
            transfer,
            content,
            b64_tail: Vec::new(),
            qp_tail: Vec::new(),
            inflater: None,
        }
    }

    /// Fails on an unknown Content-Transfer-Encoding or Content-Encoding.
    pub fn from_headers(headers: &Headers) -> Result<Self> {
        let transfer = TransferEncoding::from_header(headers.get(CONTENT_TRANSFER_ENCODING))?;
        let content = ContentEncoding::from_header(headers.get(CONTENT_ENCODING))?;
        Ok(Self::new(transfer, content))
    }

    pub fn decode(&mut self, data: &[u8], last: bool) -> Result<Vec<u8>> {
        let unwrapped = self.decode_transfer(data, last)?;
        self.decode_content(unwrapped, last)
    }

    fn decode_transfer(&mut self, data: &[u8], last: bool) -> Result<Vec<u8>> {
        match self.transfer {
            TransferEncoding::Base64 => {
                // chunk edges may fall anywhere, including inside CRLF
                self.b64_tail
                    .extend(data.iter().copied().filter(|b| !b.is_ascii_whitespace()));
                let n = if last {
                    self.b64_tail.len()
                } else {
                    self.b64_tail.len() / 4 * 4
                };
                let out = BASE64_LENIENT.decode(&self.b64_tail[..n])?;
                self.b64_tail.drain(..n);
                Ok(out)
            }
            TransferEncoding::QuotedPrintable => {
                self.qp_tail.extend_from_slice(data);
                let mut out = Vec::with_capacity(self.qp_tail.len());
                let consumed = quoted_printable::decode(&self.qp_tail, &mut out, last);
                self.qp_tail.drain(..consumed);
                Ok(out)
            }
            _ => Ok(data.to_vec()),
        }
    }

    fn decode_content(&mut self, data: Vec<u8>, last: bool) -> Result<Vec<u8>> {
        if self.content.is_identity() {
            return Ok(data);
        }
        let mut out = Vec::new();
        if !data.is_empty() {
            if self.inflater.is_none() {
                self.inflater = Inflater::new(self.content);
            }
            if let Some(inflater) = self.inflater.as_mut() {
                out = inflater.write(&data)?;
            }
        }
        if last {
            if let Some(inflater) = self.inflater.take() {
                out.extend(inflater.finish()?);
            }
        }
        Ok(out)
    }
}

enum Compressor {
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(DeflateEncoder<Vec<u8>>),
}

impl Compressor {
    fn new(encoding: ContentEncoding) -> Option<Self> {
        match encoding {
            ContentEncoding::Gzip => Some(Compressor::Gzip(GzEncoder::new(Vec::new(), Compression::default()))),
            ContentEncoding::Deflate => {
                Some(Compressor::Deflate(DeflateEncoder::new(Vec::new(), Compression::default())))
            }
            ContentEncoding::Identity => None,
        }
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Compressor::Gzip(e) => {
                e.write_all(data)?;
                Ok(std::mem::take(e.get_mut()))
            }
            Compressor::Deflate(e) => {
                e.write_all(data)?;
                Ok(std::mem::take(e.get_mut()))
            }
        }
    }

    fn finish(self) -> std::io::Result<Vec<u8>> {
        match self {
            Compressor::Gzip(e) => e.finish(),
            Compressor::Deflate(e) => e.finish(),
        }
    }
}

/// Incremental body encoder for the write direction: compress, then apply the
/// transfer encoding. Base64 output is wrapped at `line_len` columns (0: no wrapping).
pub struct BodyEncoder {
    transfer: TransferEncoding,
    compressor: Option<Compressor>,
    b64_pending: Vec<u8>,
    column: usize,
    line_len: usize,
    qp: quoted_printable::Encoder,
}

impl BodyEncoder {
    pub fn new(content: ContentEncoding, transfer: TransferEncoding, line_len: usize) -> Self {
        Self {
            transfer,
            compressor: Compressor::new(content),
            b64_pending: Vec::new(),
            column: 0,
            line_len,
            qp: quoted_printable::Encoder::new(),
        }
    }

    pub fn encode(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let compressed = match self.compressor.as_mut() {
            Some(c) => c.write(data)?,
            None => data.to_vec(),
        };
        Ok(self.encode_transfer(&compressed, false))
    }

    /// Flush compressor and encoder state; the encoder is spent afterwards.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let tail = match self.compressor.take() {
            Some(c) => c.finish()?,
            None => Vec::new(),
        };
        Ok(self.encode_transfer(&tail, true))
    }

    fn encode_transfer(&mut self, data: &[u8], last: bool) -> Vec<u8> {
        match self.transfer {
            TransferEncoding::Base64 => {
                self.b64_pending.extend_from_slice(data);
                let n = if last {
                    self.b64_pending.len()
                } else {
                    self.b64_pending.len() / 3 * 3
                };
                let encoded = STANDARD.encode(&self.b64_pending[..n]);
                self.b64_pending.drain(..n);
                let mut out = Vec::with_capacity(encoded.len() + encoded.len() / 38);
                for &b in encoded.as_bytes() {
                    if self.line_len > 0 && self.column == self.line_len {
                        out.extend_from_slice(b"\r\n");
                        self.column = 0;
                    }
                    out.push(b);
                    self.column += 1;
                }
                out
            }
            TransferEncoding::QuotedPrintable => {
                let mut out = Vec::with_capacity(data.len());
                self.qp.encode(data, &mut out);
                if last {
                    self.qp.finish(&mut out);
                }
                out
            }
            _ => data.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RELAX_DEFLATE: &[u8] = b"\x0b\xc9\xccMU(\xc9W\x08J\xcdI\xacP\x04\x00";
    const RELAX_GZIP: &[u8] = b"\x1f\x8b\x08\x00\x00\x00\x00\x00\x00\x03\x0b\xc9\xccMU(\xc9W\x08J\xcdI\xacP\x04\x00$\xfb\x9eV\x0e\x00\x00\x00";

    #[rstest]
    #[case("gzip", ContentEncoding::Gzip)]
    #[case("DEFLATE", ContentEncoding::Deflate)]
    #[case("identity", ContentEncoding::Identity)]
    #[case("", ContentEncoding::Identity)]
    fn content_encoding_names(#[case] name: &str, #[case] expected: ContentEncoding) {
        assert_eq!(ContentEncoding::from_header(Some(name)).unwrap(), expected);
    }

    #[rstest]
    #[case("base64", TransferEncoding::Base64)]
    #[case("Quoted-Printable", TransferEncoding::QuotedPrintable)]
    #[case("binary", TransferEncoding::Binary)]
    #[case("8bit", TransferEncoding::EightBit)]
    #[case("7bit", TransferEncoding::SevenBit)]
    fn transfer_encoding_names(#[case] name: &str, #[case] expected: TransferEncoding) {
        assert_eq!(TransferEncoding::from_header(Some(name)).unwrap(), expected);
    }

    #[test]
    fn unknown_encodings_rejected() {
        assert!(matches!(
            ContentEncoding::from_header(Some("snappy")),
            Err(MultipartError::UnknownContentEncoding(_))
        ));
        assert!(matches!(
            TransferEncoding::from_header(Some("unknown")),
            Err(MultipartError::UnknownTransferEncoding(_))
        ));
    }

    #[test]
    fn gzip_and_raw_deflate() {
        let mut d = BodyDecoder::new(TransferEncoding::Binary, ContentEncoding::Gzip);
        assert_eq!(d.decode(RELAX_GZIP, true).unwrap(), b"Time to Relax!");
        let mut d = BodyDecoder::new(TransferEncoding::Binary, ContentEncoding::Deflate);
        assert_eq!(d.decode(RELAX_DEFLATE, true).unwrap(), b"Time to Relax!");
    }

    #[test]
    fn base64_split_quanta() {
        let mut d = BodyDecoder::new(TransferEncoding::Base64, ContentEncoding::Identity);
        let mut out = Vec::new();
        for chunk in [&b"VG\r\r"[..], b"\nltZS", b"B0byBSZ\r", b"\nWxheCE=", b""] {
            out.extend(d.decode(chunk, false).unwrap());
        }
        out.extend(d.decode(b"", true).unwrap());
        assert_eq!(out, b"Time to Relax!");
    }

    #[test]
    fn base64_without_padding() {
        let mut d = BodyDecoder::new(TransferEncoding::Base64, ContentEncoding::Identity);
        assert_eq!(d.decode(b"VGltZSB0byBSZWxheCE", true).unwrap(), b"Time to Relax!");
    }

    #[test]
    fn quoted_printable_escape_across_chunks() {
        let mut d = BodyDecoder::new(TransferEncoding::QuotedPrintable, ContentEncoding::Identity);
        let mut out = d.decode(b"caf=C", false).unwrap();
        out.extend(d.decode(b"3=A9", true).unwrap());
        assert_eq!(out, "café".as_bytes());
    }

    #[test]
    fn base64_over_gzip() {
        let mut enc = BodyEncoder::new(ContentEncoding::Gzip, TransferEncoding::Base64, 76);
        let payload = "Time to Relax! ".repeat(40);
        let mut wire = Vec::new();
        for piece in payload.as_bytes().chunks(7) {
            wire.extend(enc.encode(piece).unwrap());
        }
        wire.extend(enc.finish().unwrap());
        assert!(wire.split(|&b| b == b'\n').all(|l| l.len() <= 77));

        let mut dec = BodyDecoder::new(TransferEncoding::Base64, ContentEncoding::Gzip);
        let mut plain = Vec::new();
        for piece in wire.chunks(5) {
            plain.extend(dec.decode(piece, false).unwrap());
        }
        plain.extend(dec.decode(b"", true).unwrap());
        assert_eq!(plain, payload.as_bytes());
    }

    #[test]
    fn base64_encode_short() {
        let mut enc = BodyEncoder::new(ContentEncoding::Identity, TransferEncoding::Base64, 76);
        let mut out = enc.encode(b"Time to ").unwrap();
        out.extend(enc.encode(b"Relax!").unwrap());
        out.extend(enc.finish().unwrap());
        assert_eq!(out, b"VGltZSB0byBSZWxheCE=");
    }
}
