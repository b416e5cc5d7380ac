/*
 * multipart_roundtrip.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests: envelopes serialised by MultipartWriter and read back
 * through MultipartReader, over streams that hand out a few bytes per read.
 *
 * Run with:
 *   cargo test -p tagliacarte_multipart --test multipart_roundtrip
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use rstest::rstest;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, ReadBuf};

use tagliacarte_multipart::headers::{CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_TRANSFER_ENCODING};
use tagliacarte_multipart::{
    BodyPartReader, Headers, MultipartConfig, MultipartReader, MultipartWriter, Part, Payload, SharedStream,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Hands out at most `step` bytes per read.
struct Trickle {
    data: Vec<u8>,
    pos: usize,
    step: usize,
}

impl AsyncRead for Trickle {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let n = self.step.min(buf.remaining()).min(self.data.len() - self.pos);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

fn trickle(data: Vec<u8>, step: usize) -> SharedStream<Trickle> {
    SharedStream::new(Trickle { data, pos: 0, step })
}

fn header(name: &str, value: &str) -> Option<Headers> {
    Some([(name, value)].into_iter().collect())
}

async fn next_body<R>(reader: &MultipartReader<R>) -> BodyPartReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    reader
        .next()
        .await
        .unwrap()
        .and_then(Part::into_body)
        .expect("body part")
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Note {
    title: String,
    tags: Vec<String>,
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(4096)]
#[tokio::test]
async fn mixed_round_trip(#[case] step: usize) {
    init_logging();
    let note = Note {
        title: "Relax".to_string(),
        tags: vec!["a".to_string(), "b".to_string()],
    };
    let binary: Vec<u8> = (0..=255u8).collect();
    let long_text = "Time to Relax! ".repeat(50);

    let mut writer = MultipartWriter::new("mixed", None).unwrap();
    writer.append("plain text", None).unwrap();
    writer.append_json(&note, None).unwrap();
    writer
        .append(binary.clone(), header(CONTENT_TRANSFER_ENCODING, "base64"))
        .unwrap();
    writer
        .append(long_text.as_str(), header(CONTENT_ENCODING, "gzip"))
        .unwrap();
    writer
        .append("Привет, мир!", header(CONTENT_TRANSFER_ENCODING, "quoted-printable"))
        .unwrap();
    let data = writer.as_bytes().await.unwrap();

    let config = MultipartConfig::new().chunk_size(64);
    let reader = MultipartReader::with_config(writer.headers().clone(), trickle(data, step), config).unwrap();
    assert_eq!(next_body(&reader).await.text(None).await.unwrap(), "plain text");
    assert_eq!(next_body(&reader).await.json::<Note>(None).await.unwrap(), Some(note));
    assert_eq!(next_body(&reader).await.read(true).await.unwrap(), binary);
    assert_eq!(next_body(&reader).await.text(None).await.unwrap(), long_text);
    assert_eq!(next_body(&reader).await.text(None).await.unwrap(), "Привет, мир!");
    assert!(reader.next().await.unwrap().is_none());
    assert!(reader.at_eof());
}

fn nested_envelope() -> MultipartWriter {
    let mut inner = MultipartWriter::new("related", Some("inner-boundary")).unwrap();
    inner.append("inner one", None).unwrap();
    inner.append_json(&serde_json::json!({"inner": 2}), None).unwrap();
    let mut outer = MultipartWriter::new("mixed", Some("outer-boundary")).unwrap();
    outer.append("before", None).unwrap();
    outer.append(inner, None).unwrap();
    outer.append("after", None).unwrap();
    outer
}

#[tokio::test]
async fn nested_round_trip() {
    init_logging();
    let mut writer = nested_envelope();
    let data = writer.as_bytes().await.unwrap();
    let reader = MultipartReader::new(writer.headers().clone(), trickle(data, 5)).unwrap();

    assert_eq!(next_body(&reader).await.text(None).await.unwrap(), "before");
    let nested = reader
        .next()
        .await
        .unwrap()
        .and_then(Part::into_multipart)
        .expect("nested envelope");
    assert_eq!(nested.boundary(), "inner-boundary");
    assert_eq!(next_body(&nested).await.text(None).await.unwrap(), "inner one");
    let value: Option<serde_json::Value> = next_body(&nested).await.json(None).await.unwrap();
    assert_eq!(value, Some(serde_json::json!({"inner": 2})));
    assert!(nested.next().await.unwrap().is_none());

    assert_eq!(next_body(&reader).await.text(None).await.unwrap(), "after");
    assert!(reader.next().await.unwrap().is_none());
}

#[tokio::test]
async fn unread_nested_envelope_skipped() {
    let mut writer = nested_envelope();
    let data = writer.as_bytes().await.unwrap();
    let reader = MultipartReader::new(writer.headers().clone(), trickle(data, 3)).unwrap();
    next_body(&reader).await;
    let nested = reader.next().await.unwrap().unwrap();
    assert!(nested.is_multipart());
    assert_eq!(next_body(&reader).await.text(None).await.unwrap(), "after");
    assert!(reader.next().await.unwrap().is_none());
}

#[tokio::test]
async fn form_data_round_trip() {
    init_logging();
    let (greeting, _, _) = encoding_rs::WINDOWS_1251.encode("Привет");
    let mut writer = MultipartWriter::new("form-data", None).unwrap();
    writer
        .append("windows-1251", header(CONTENT_DISPOSITION, "form-data; name=\"_charset_\""))
        .unwrap();
    writer
        .append(greeting.into_owned(), None)
        .unwrap()
        .set_content_disposition("form-data", &[("name", "greeting"), ("filename", "привет.txt")]);
    writer.append_form(&[("q", "a b")], None).unwrap();
    let data = writer.as_bytes().await.unwrap();

    let reader = MultipartReader::new(writer.headers().clone(), trickle(data, 11)).unwrap();
    let part = next_body(&reader).await;
    assert_eq!(reader.default_charset(), Some("windows-1251"));
    assert_eq!(part.name(), Some("greeting"));
    assert_eq!(part.filename(), Some("привет.txt"));
    assert_eq!(part.text(None).await.unwrap(), "Привет");

    let part = next_body(&reader).await;
    assert_eq!(part.name(), Some("section-2"));
    assert_eq!(part.form(None).await.unwrap(), vec![("q".to_string(), "a b".to_string())]);
    assert!(reader.next().await.unwrap().is_none());
}

#[tokio::test]
async fn stream_payload_serialised_repeatedly() {
    let mut source = io::Cursor::new(b"header|streamed body".to_vec());
    source.set_position(7);
    let mut writer = MultipartWriter::new("mixed", Some("b")).unwrap();
    writer.append(Payload::stream(source), None).unwrap();
    writer
        .append("encoded", header(CONTENT_TRANSFER_ENCODING, "base64"))
        .unwrap();
    let first = writer.as_bytes().await.unwrap();
    let second = writer.as_bytes().await.unwrap();
    assert_eq!(first, second);

    let reader = MultipartReader::new(writer.headers().clone(), trickle(second, 4)).unwrap();
    let part = next_body(&reader).await;
    assert_eq!(part.content_length(), Some(13));
    assert_eq!(part.read(false).await.unwrap(), &b"streamed body"[..]);
    assert_eq!(next_body(&reader).await.text(None).await.unwrap(), "encoded");
    writer.close().unwrap();
    writer.close().unwrap();
    assert!(writer.is_consumed());
}
