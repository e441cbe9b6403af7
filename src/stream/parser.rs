//! Event-Stream Parser
//!
//! Turns a server-sent-event byte stream into typed chat completion chunks.
//!
//! Only `data: ` lines carry payloads. `data: [DONE]` ends the stream, and so
//! does a clean end of input. Every other payload must decode as one
//! [`ChatCompletionChunk`]; the first one that doesn't ends the stream with
//! [`MistralError::Parse`].

use crate::api::ChatCompletionChunk;
use crate::error::{MistralError, Result};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, trace, warn};

/// Size of the line buffer. A line plus its `\n` must fit, so the longest
/// accepted line is one byte shorter.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

const DATA_PREFIX: &[u8] = b"data: ";
const DONE_SENTINEL: &[u8] = b"[DONE]";

/// Splits a byte stream into lines, one at a time
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Take the next complete line, without its `\n` or `\r\n` terminator
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(end) => {
                let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                check_length(line.len())?;
                Ok(Some(line))
            }
            None => {
                check_length(self.buffer.len())?;
                Ok(None)
            }
        }
    }

    /// Take whatever is left once the input has ended
    pub fn finish(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let mut line = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        check_length(line.len())?;
        Ok(Some(line))
    }
}

fn check_length(len: usize) -> Result<()> {
    if len >= MAX_LINE_BYTES {
        return Err(MistralError::Read(format!(
            "line too long (limit {} bytes)",
            MAX_LINE_BYTES
        )));
    }
    Ok(())
}

/// A stripped `data: ` payload
enum RawEvent<'a> {
    Done,
    Data(&'a [u8]),
}

impl<'a> RawEvent<'a> {
    fn from_line(line: &'a [u8]) -> Option<Self> {
        let payload = line.strip_prefix(DATA_PREFIX)?;
        if payload == DONE_SENTINEL {
            Some(RawEvent::Done)
        } else {
            Some(RawEvent::Data(payload))
        }
    }
}

/// What one line contributes to the stream
enum Step {
    Skip,
    Finished,
    Chunk(ChatCompletionChunk),
}

fn process_line(line: &[u8]) -> Result<Step> {
    match RawEvent::from_line(line) {
        None => {
            trace!(line = %String::from_utf8_lossy(line), "Skipping non-data line");
            Ok(Step::Skip)
        }
        Some(RawEvent::Done) => {
            debug!("Received [DONE] marker");
            Ok(Step::Finished)
        }
        Some(RawEvent::Data(data)) => serde_json::from_slice::<ChatCompletionChunk>(data)
            .map(Step::Chunk)
            .map_err(|source| {
                let data = String::from_utf8_lossy(data).into_owned();
                warn!(error = %source, %data, "Malformed stream chunk");
                MistralError::Parse { data, source }
            }),
    }
}

pin_project! {
    /// Stream adapter that parses SSE lines into chat completion chunks.
    ///
    /// Yields chunks in arrival order, then ends. At most one error is
    /// yielded and nothing follows it.
    pub struct EventStreamParser<S> {
        #[pin]
        inner: S,
        lines: LineDecoder,
        finished: bool,
    }
}

impl<S> EventStreamParser<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            lines: LineDecoder::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for EventStreamParser<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
{
    type Item = Result<ChatCompletionChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.finished {
            return Poll::Ready(None);
        }

        loop {
            let step = match this.lines.next_line() {
                Ok(Some(line)) => process_line(&line),
                Ok(None) => match this.inner.as_mut().poll_next(cx) {
                    Poll::Ready(Some(Ok(bytes))) => {
                        trace!(bytes_len = bytes.len(), "Received SSE data chunk");
                        this.lines.push(&bytes);
                        continue;
                    }
                    Poll::Ready(Some(Err(e))) => {
                        warn!(error = %e, "Error reading stream");
                        Err(MistralError::Read(e.to_string()))
                    }
                    Poll::Ready(None) => {
                        debug!("Stream input ended");
                        *this.finished = true;
                        match this.lines.finish() {
                            Ok(Some(line)) => process_line(&line),
                            Ok(None) => Ok(Step::Finished),
                            Err(e) => Err(e),
                        }
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Err(e) => Err(e),
            };

            match step {
                Ok(Step::Skip) if !*this.finished => continue,
                Ok(Step::Skip) | Ok(Step::Finished) => {
                    *this.finished = true;
                    return Poll::Ready(None);
                }
                Ok(Step::Chunk(chunk)) => return Poll::Ready(Some(Ok(chunk))),
                Err(e) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io;

    fn chunk_line(id: &str, content: &str) -> String {
        format!(
            "data: {{\"id\":\"{id}\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{content}\"}},\"finish_reason\":null}}]}}\n"
        )
    }

    fn source(parts: Vec<&str>) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> {
        futures::stream::iter(
            parts
                .into_iter()
                .map(|p| Ok::<_, io::Error>(Bytes::copy_from_slice(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn run(parts: Vec<&str>) -> Vec<Result<ChatCompletionChunk>> {
        EventStreamParser::new(source(parts)).collect().await
    }

    fn contents(items: &[Result<ChatCompletionChunk>]) -> Vec<String> {
        items
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|c| c.content().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_chunks_until_done() {
        let a = chunk_line("1", "A");
        let b = chunk_line("2", "B");
        let after = chunk_line("3", "never");
        let items = run(vec![&a, "\n", &b, "\n", "data: [DONE]\n", &after]).await;

        assert_eq!(items.len(), 2);
        assert_eq!(contents(&items), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_eof_without_sentinel_is_clean() {
        let a = chunk_line("1", "A");
        let b = chunk_line("2", "B");
        let items = run(vec![&a, &b]).await;

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_terminal() {
        let a = chunk_line("1", "A");
        let c = chunk_line("3", "C");
        let items = run(vec![&a, "data: not-json\n", &c, "data: [DONE]\n"]).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().id, "1");
        match &items[1] {
            Err(MistralError::Parse { data, .. }) => assert_eq!(data, "not-json"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_data_lines_are_skipped() {
        let a = chunk_line("1", "A");
        let items = run(vec![
            ": keep-alive\n",
            "event: message\n",
            "id: 7\n",
            "retry: 1000\n",
            "data:no-space\n",
            "\n",
            &a,
            "data: [DONE]\n",
        ])
        .await;

        assert_eq!(contents(&items), vec!["A"]);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_crlf_and_split_reads() {
        let a = chunk_line("1", "A").replace('\n', "\r\n");
        let (head, tail) = a.split_at(17);
        let items = run(vec![head, tail, "data: [DO", "NE]\r\n"]).await;

        assert_eq!(items.len(), 1);
        assert_eq!(contents(&items), vec!["A"]);
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let a = chunk_line("1", "A");
        let last = a.trim_end();
        let items = run(vec![last]).await;

        assert_eq!(contents(&items), vec!["A"]);
    }

    #[tokio::test]
    async fn test_over_long_line_is_read_error() {
        let long = format!("data: {}\n", "x".repeat(MAX_LINE_BYTES + 1));
        let items = run(vec![&long]).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(MistralError::Read(_))));
    }

    #[tokio::test]
    async fn test_line_length_boundary() {
        let longest = format!(": {}\n", "x".repeat(MAX_LINE_BYTES - 3));
        let a = chunk_line("1", "A");
        let items = run(vec![&longest, &a]).await;
        assert_eq!(contents(&items), vec!["A"]);

        let too_long = format!(": {}\n", "x".repeat(MAX_LINE_BYTES - 2));
        let items = run(vec![&too_long, &a]).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(MistralError::Read(_))));
    }

    #[tokio::test]
    async fn test_sentinel_must_match_exactly() {
        let a = chunk_line("1", "A");
        let items = run(vec!["data: [DONE] \n", &a]).await;

        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(MistralError::Parse { data, .. }) => assert_eq!(data, "[DONE] "),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_source_error_after_chunk() {
        let a = chunk_line("1", "A");
        let parts: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from(a)),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            Ok(Bytes::from_static(b"data: [DONE]\n")),
        ];
        let items: Vec<_> = EventStreamParser::new(futures::stream::iter(parts))
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        match &items[1] {
            Err(MistralError::Read(msg)) => assert!(msg.contains("connection reset")),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_line_decoder_keeps_partial_line() {
        let mut lines = LineDecoder::new();
        lines.push(b"data: a\ndata: b");

        assert_eq!(lines.next_line().unwrap(), Some(b"data: a".to_vec()));
        assert_eq!(lines.next_line().unwrap(), None);
        assert_eq!(lines.finish().unwrap(), Some(b"data: b".to_vec()));
        assert_eq!(lines.finish().unwrap(), None);
    }
}
