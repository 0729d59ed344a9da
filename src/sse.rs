//! Incremental decoder for the streamed bulk delete response.
//!
//! When a delete matches any accounts the server answers with
//! `text/event-stream` and writes one record per deleted batch:
//! ```text
//! event:progress
//! data:{"deleted":500,"total":1200}
//!
//! event:progress
//! data:{"deleted":1000,"total":1200}
//!
//! event:done
//! data:{"deleted":1200,"total":1200}
//! ```
//!
//! Every `data:` line is a progress record. The `data:` line that follows
//! `event: done` is the final result. An `event: error` line followed by
//! `{"error": "..."}` aborts the delete. Chunks from the network may split
//! lines, JSON values and UTF-8 characters anywhere; the decoder produces the
//! same records for every split.

use futures::stream::{Stream, StreamExt};
use tracing::{debug, trace, warn};

use crate::client::ClientError;
use crate::http::is_event_stream;
use crate::model::{DeleteSummary, ErrorBody, ProgressEvent};

/// Splits a byte stream into text lines.
///
/// Holds the not yet newline-terminated text and any incomplete UTF-8
/// sequence at the end of the last chunk.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes, without the line
    /// terminator (`\n` or `\r\n`).
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, ClientError> {
        self.pending.extend_from_slice(chunk);

        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.pending.len()
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete sequence at the end, wait for the next chunk.
                let valid_up_to = e.valid_up_to();
                let text = std::str::from_utf8(&self.pending[..valid_up_to])
                    .map_err(|e| ClientError::Decode(e.to_string()))?;
                self.buffer.push_str(text);
                valid_up_to
            }
            Err(e) => return Err(ClientError::Decode(e.to_string())),
        };
        self.pending.drain(..valid_up_to);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Ok(Vec::new());
        };
        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        Ok(complete.lines().map(str::to_string).collect())
    }

    /// Take the trailing unterminated line, if any.
    ///
    /// Fails if the stream stopped in the middle of a UTF-8 character.
    pub fn finish(&mut self) -> Result<Option<String>, ClientError> {
        if !self.pending.is_empty() {
            let len = self.pending.len();
            self.pending.clear();
            return Err(ClientError::Decode(format!(
                "stream ended inside a multi-byte character ({} dangling bytes)",
                len
            )));
        }

        let mut line = std::mem::take(&mut self.buffer);
        if line.ends_with('\r') {
            line.pop();
        }
        Ok((!line.is_empty()).then_some(line))
    }
}

/// Which record a bare `event:` line announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Done,
    Error,
}

/// Decoder state for one streamed delete.
///
/// A marker line whose `data:` companion has not arrived yet stays armed
/// across chunks, so it matches even when the two lines come in separate
/// reads.
#[derive(Debug, Default)]
pub struct DeleteStreamDecoder {
    lines: LineBuffer,
    awaiting: Option<Marker>,
}

impl DeleteStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, reporting progress records through `on_progress`.
    ///
    /// Returns the final summary once the done record is complete. Anything
    /// after it in the same chunk is ignored.
    pub fn feed<F>(&mut self, chunk: &[u8], on_progress: &mut F) -> Result<Option<DeleteSummary>, ClientError>
    where
        F: FnMut(&ProgressEvent),
    {
        for line in self.lines.feed(chunk)? {
            if let Some(summary) = self.handle_line(&line, on_progress)? {
                return Ok(Some(summary));
            }
        }
        Ok(None)
    }

    /// Wrap up once the byte stream has ended.
    ///
    /// Only newline-terminated lines count as records, so a trailing
    /// fragment and any dangling UTF-8 bytes are discarded.
    pub fn finish(mut self) {
        match self.lines.finish() {
            Ok(Some(fragment)) => debug!(%fragment, "unterminated trailing line discarded"),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "dangling bytes at end of stream discarded"),
        }
        if let Some(marker) = self.awaiting {
            debug!(?marker, "stream ended before the marker's data line");
        }
    }

    fn handle_line<F>(&mut self, line: &str, on_progress: &mut F) -> Result<Option<DeleteSummary>, ClientError>
    where
        F: FnMut(&ProgressEvent),
    {
        if let Some(marker) = self.awaiting.take() {
            match data_payload(line) {
                Some(payload) => return Self::complete_marker(marker, payload).map(Some),
                None => debug!(?marker, line, "marker not followed by a data line, dropped"),
            }
        }

        if let Some(payload) = data_payload(line) {
            let event: ProgressEvent = serde_json::from_str(payload)?;
            trace!(payload, "progress record");
            on_progress(&event);
            return Ok(None);
        }

        match event_name(line) {
            Some("done") => self.awaiting = Some(Marker::Done),
            Some("error") => self.awaiting = Some(Marker::Error),
            _ => {}
        }
        Ok(None)
    }

    fn complete_marker(marker: Marker, payload: &str) -> Result<DeleteSummary, ClientError> {
        match marker {
            Marker::Done => {
                let summary: DeleteSummary = serde_json::from_str(payload)?;
                trace!(deleted = summary.deleted, total = summary.total, "done record");
                Ok(summary)
            }
            Marker::Error => {
                let body: ErrorBody = serde_json::from_str(payload)?;
                Err(ClientError::Server(body.error))
            }
        }
    }
}

/// The JSON text after a `data:` prefix.
///
/// # Example
/// ```
/// use account_hub::sse::data_payload;
///
/// assert_eq!(data_payload("data: {\"deleted\":1}"), Some("{\"deleted\":1}"));
/// assert_eq!(data_payload("data:{}"), Some("{}"));
/// assert_eq!(data_payload("event: done"), None);
/// ```
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// The name after an `event:` prefix, with surrounding spaces removed.
///
/// # Example
/// ```
/// use account_hub::sse::event_name;
///
/// assert_eq!(event_name("event: done"), Some("done"));
/// assert_eq!(event_name("event:done"), Some("done"));
/// assert_eq!(event_name("data: {}"), None);
/// ```
pub fn event_name(line: &str) -> Option<&str> {
    line.strip_prefix("event:").map(str::trim)
}

/// Decode a streamed delete from any source of byte chunks.
///
/// Reads chunks one at a time. Resolves with the done record, or with
/// `{deleted: 0, total: 0}` if the stream ends without one. Read errors,
/// malformed UTF-8 and malformed JSON fail the whole operation. Dropping the
/// returned future drops the stream.
pub async fn decode_delete_stream<S, B, E, F>(stream: S, mut on_progress: F) -> Result<DeleteSummary, ClientError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
    F: FnMut(&ProgressEvent),
{
    let mut stream = Box::pin(stream);
    let mut decoder = DeleteStreamDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        if let Some(summary) = decoder.feed(chunk.as_ref(), &mut on_progress)? {
            return Ok(summary);
        }
    }

    decoder.finish();
    warn!("delete stream ended without a done record");
    Ok(DeleteSummary::default())
}

/// Extension trait for `reqwest::Response` to decode a bulk delete reply.
pub trait DeleteResponseExt {
    /// Decode the reply of `DELETE /api/accounts`.
    ///
    /// A `text/event-stream` reply goes through [`decode_delete_stream`];
    /// anything else is parsed as one JSON document and `on_progress` is
    /// never called. The status code is not checked here.
    fn delete_summary<F>(self, on_progress: F) -> impl std::future::Future<Output = Result<DeleteSummary, ClientError>> + Send
    where
        F: FnMut(&ProgressEvent) + Send;
}

impl DeleteResponseExt for reqwest::Response {
    fn delete_summary<F>(self, on_progress: F) -> impl std::future::Future<Output = Result<DeleteSummary, ClientError>> + Send
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        async move {
            if is_event_stream(&self) {
                decode_delete_stream(self.bytes_stream(), on_progress).await
            } else {
                let body = self.bytes().await?;
                Ok(serde_json::from_slice(&body)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    const PROGRESS_THEN_DONE: &str =
        "data: {\"deleted\":1,\"total\":5}\nevent: done\ndata: {\"deleted\":5,\"total\":5}\n";

    fn ok_chunks(chunks: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, ClientError>> {
        stream::iter(chunks.into_iter().map(Ok))
    }

    async fn decode(chunks: Vec<Vec<u8>>) -> (Vec<ProgressEvent>, Result<DeleteSummary, ClientError>) {
        let mut events = Vec::new();
        let result = decode_delete_stream(ok_chunks(chunks), |e: &ProgressEvent| events.push(e.clone())).await;
        (events, result)
    }

    #[test]
    fn test_line_buffer_keeps_partial_line() {
        let mut lines = LineBuffer::new();
        assert!(lines.feed(b"data: {\"a\"").unwrap().is_empty());
        assert_eq!(lines.feed(b":1}\r\nnext").unwrap(), vec!["data: {\"a\":1}"]);
        assert_eq!(lines.finish().unwrap(), Some("next".to_string()));
        assert_eq!(lines.finish().unwrap(), None);
    }

    #[test]
    fn test_line_buffer_keeps_empty_lines() {
        let mut lines = LineBuffer::new();
        assert_eq!(lines.feed(b"a\n\nb\n").unwrap(), vec!["a", "", "b"]);
    }

    #[test]
    fn test_line_buffer_carries_split_character() {
        let text = "data: \"caf\u{e9} \u{1f980}\"\n".as_bytes();
        let mut lines = LineBuffer::new();
        // Cut inside the four-byte crab.
        let cut = text.len() - 3;
        assert!(lines.feed(&text[..cut]).unwrap().is_empty());
        assert_eq!(lines.feed(&text[cut..]).unwrap(), vec!["data: \"caf\u{e9} \u{1f980}\""]);
    }

    #[test]
    fn test_line_buffer_rejects_invalid_utf8() {
        let mut lines = LineBuffer::new();
        assert!(matches!(lines.feed(b"data: \xff\xfe\n"), Err(ClientError::Decode(_))));
    }

    #[test]
    fn test_line_buffer_rejects_truncated_character_at_end() {
        let mut lines = LineBuffer::new();
        lines.feed(&[b'x', 0xe2, 0x82]).unwrap();
        assert!(matches!(lines.finish(), Err(ClientError::Decode(_))));
    }

    #[tokio::test]
    async fn test_progress_then_done() {
        let (events, result) = decode(vec![PROGRESS_THEN_DONE.as_bytes().to_vec()]).await;
        assert_eq!(events, vec![ProgressEvent(json!({"deleted": 1, "total": 5}))]);
        assert_eq!(result.unwrap(), DeleteSummary { deleted: 5, total: 5 });
    }

    #[tokio::test]
    async fn test_every_split_gives_the_same_result() {
        let payload = "event:progress\ndata:{\"deleted\":1,\"total\":5,\"note\":\"\u{e9}t\u{e9}\"}\n\n\
                       event:progress\r\ndata: {\"deleted\":3,\"total\":5}\r\n\r\n\
                       event: done\ndata: {\"deleted\":5,\"total\":5}\n\n"
            .as_bytes()
            .to_vec();
        let (expected_events, expected) = decode(vec![payload.clone()]).await;
        let expected = expected.unwrap();
        assert_eq!(expected_events.len(), 2);
        assert_eq!(expected, DeleteSummary { deleted: 5, total: 5 });

        for first in 1..payload.len() {
            for second in first..payload.len() {
                let chunks = vec![
                    payload[..first].to_vec(),
                    payload[first..second].to_vec(),
                    payload[second..].to_vec(),
                ];
                let (events, result) = decode(chunks).await;
                assert_eq!(events, expected_events, "cuts at {} and {}", first, second);
                assert_eq!(result.unwrap(), expected, "cuts at {} and {}", first, second);
            }
        }
    }

    #[tokio::test]
    async fn test_one_byte_chunks() {
        let chunks = PROGRESS_THEN_DONE.bytes().map(|b| vec![b]).collect();
        let (events, result) = decode(chunks).await;
        assert_eq!(events.len(), 1);
        assert_eq!(result.unwrap(), DeleteSummary { deleted: 5, total: 5 });
    }

    #[tokio::test]
    async fn test_done_and_data_in_separate_chunks() {
        let chunks = vec![b"event: done\n".to_vec(), b"data: {\"deleted\":2,\"total\":2}\n".to_vec()];
        let (events, result) = decode(chunks).await;
        assert!(events.is_empty());
        assert_eq!(result.unwrap(), DeleteSummary { deleted: 2, total: 2 });
    }

    #[tokio::test]
    async fn test_progress_only_resolves_with_zero() {
        let chunks = vec![b"data: {\"deleted\":1,\"total\":4}\ndata: {\"deleted\":2,\"total\":4}\n".to_vec()];
        let (events, result) = decode(chunks).await;
        assert_eq!(events.len(), 2);
        assert_eq!(result.unwrap(), DeleteSummary { deleted: 0, total: 0 });
    }

    #[tokio::test]
    async fn test_empty_stream_resolves_with_zero() {
        let (events, result) = decode(Vec::new()).await;
        assert!(events.is_empty());
        assert_eq!(result.unwrap(), DeleteSummary::default());
    }

    #[tokio::test]
    async fn test_unterminated_done_data_line_is_not_a_record() {
        let chunks = vec![b"event: done\ndata: {\"deleted\":4,\"total\":4}".to_vec()];
        let (_, result) = decode(chunks).await;
        assert_eq!(result.unwrap(), DeleteSummary::default());
    }

    #[tokio::test]
    async fn test_stream_closed_mid_line_resolves_with_zero() {
        let chunks = vec![
            b"data: {\"deleted\":1,\"total\":2}\n".to_vec(),
            b"data: {\"del".to_vec(),
        ];
        let (events, result) = decode(chunks).await;
        assert_eq!(events, vec![ProgressEvent(json!({"deleted": 1, "total": 2}))]);
        assert_eq!(result.unwrap(), DeleteSummary::default());
    }

    #[tokio::test]
    async fn test_unterminated_progress_line_is_not_reported() {
        let chunks = vec![b"data: {\"deleted\":1,\"total\":2}\ndata: {\"deleted\":2,\"total\":2}".to_vec()];
        let (events, result) = decode(chunks).await;
        assert_eq!(events.len(), 1);
        assert_eq!(result.unwrap(), DeleteSummary::default());
    }

    #[tokio::test]
    async fn test_stream_closed_mid_character_resolves_with_zero() {
        let chunks = vec![b"data: {\"deleted\":1,\"total\":2}\n".to_vec(), vec![b'x', 0xe2, 0x82]];
        let (events, result) = decode(chunks).await;
        assert_eq!(events.len(), 1);
        assert_eq!(result.unwrap(), DeleteSummary::default());
    }

    #[tokio::test]
    async fn test_done_record_with_extra_count_field() {
        let chunks = vec![b"event: done\ndata: {\"deleted\":5,\"total\":5,\"count\":5}\n".to_vec()];
        let (_, result) = decode(chunks).await;
        assert_eq!(result.unwrap(), DeleteSummary { deleted: 5, total: 5 });
    }

    #[tokio::test]
    async fn test_done_without_data_is_dropped() {
        let chunks = vec![b"event: done\nevent: progress\ndata: {\"deleted\":1,\"total\":1}\n".to_vec()];
        let (events, result) = decode(chunks).await;
        assert_eq!(events.len(), 1);
        assert_eq!(result.unwrap(), DeleteSummary::default());
    }

    #[tokio::test]
    async fn test_data_after_done_is_ignored() {
        let chunks = vec![
            b"event: done\ndata: {\"deleted\":1,\"total\":1}\ndata: not json\n".to_vec(),
            b"data: {\"deleted\":9,\"total\":9}\n".to_vec(),
        ];
        let (events, result) = decode(chunks).await;
        assert!(events.is_empty());
        assert_eq!(result.unwrap(), DeleteSummary { deleted: 1, total: 1 });
    }

    #[tokio::test]
    async fn test_unknown_lines_are_ignored() {
        let chunks = vec![b": keep-alive\nid: 3\nretry: 100\nevent: done\ndata: {\"deleted\":3,\"total\":3}\n".to_vec()];
        let (events, result) = decode(chunks).await;
        assert!(events.is_empty());
        assert_eq!(result.unwrap(), DeleteSummary { deleted: 3, total: 3 });
    }

    #[tokio::test]
    async fn test_invalid_json_fails() {
        let chunks = vec![b"data: {\"deleted\":1,\n".to_vec(), b"event: done\ndata: {}\n".to_vec()];
        let (events, result) = decode(chunks).await;
        assert!(events.is_empty());
        assert!(matches!(result, Err(ClientError::Parse(_))));
    }

    #[tokio::test]
    async fn test_invalid_done_payload_fails() {
        let chunks = vec![b"event: done\ndata: [1, 2\n".to_vec()];
        let (_, result) = decode(chunks).await;
        assert!(matches!(result, Err(ClientError::Parse(_))));
    }

    #[tokio::test]
    async fn test_error_record_fails_with_server_message() {
        let chunks = vec![b"event:progress\ndata:{\"deleted\":500,\"total\":900}\n\nevent:error\ndata:{\"error\":\"database is locked\"}\n\n".to_vec()];
        let (events, result) = decode(chunks).await;
        assert_eq!(events.len(), 1);
        match result {
            Err(ClientError::Server(message)) => assert_eq!(message, "database is locked"),
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_error_fails() {
        let chunks: Vec<Result<Vec<u8>, ClientError>> = vec![
            Ok(b"data: {\"deleted\":1,\"total\":2}\n".to_vec()),
            Err(ClientError::Server("connection reset".to_string())),
            Ok(b"event: done\ndata: {\"deleted\":2,\"total\":2}\n".to_vec()),
        ];
        let mut seen = 0;
        let result = decode_delete_stream(stream::iter(chunks), |_: &ProgressEvent| seen += 1).await;
        assert_eq!(seen, 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_decoding_twice_is_identical() {
        let first = decode(vec![PROGRESS_THEN_DONE.as_bytes().to_vec()]).await;
        let second = decode(vec![PROGRESS_THEN_DONE.as_bytes().to_vec()]).await;
        assert_eq!(first.0, second.0);
        assert_eq!(first.1.unwrap(), second.1.unwrap());
    }
}
