//! Server-sent-event decoding for streaming completions.
//!
//! Both providers stream `data: <json>` lines. The decoder buffers raw bytes
//! so multi-byte characters split across network chunks survive intact.

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::completion::{CompletionFailure, FragmentStream};

/// One decoded SSE payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    /// OpenAI-style `[DONE]` terminator.
    Done,
}

/// Incremental line decoder for an SSE body.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk and return every complete event it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = Self::parse_line(line.trim()) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a final unterminated line at end of stream.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        Self::parse_line(line.trim())
    }

    fn parse_line(line: &str) -> Option<SseEvent> {
        // Comments (": keep-alive") and event/id fields carry no payload.
        let data = line.strip_prefix("data:")?.trim_start();
        if data.is_empty() {
            return None;
        }
        if data == "[DONE]" {
            return Some(SseEvent::Done);
        }
        Some(SseEvent::Data(data.to_string()))
    }
}

/// Turn a streaming HTTP response into a fragment stream.
///
/// `parse` maps one `data:` payload to an optional text fragment. A reader
/// task forwards fragments over a channel until `[DONE]`, end of body, the
/// first error, or the receiver is dropped. Dropping the receiver also drops
/// the response, so a stalled upstream does not keep its connection open.
pub fn fragment_stream<F>(response: reqwest::Response, provider: &'static str, parse: F) -> FragmentStream
where
    F: Fn(&str) -> Result<Option<String>, CompletionFailure> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<String, CompletionFailure>>(64);

    tokio::spawn(async move {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();
        let mut fragments = 0usize;

        'read: loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!(provider, fragments, "Completion stream abandoned");
                    return;
                }
                next = body.next() => next,
            };

            let (events, at_eof) = match next {
                Some(Ok(bytes)) => (decoder.push(&bytes), false),
                Some(Err(e)) => {
                    let _ = tx.send(Err(CompletionFailure::from_reqwest(e))).await;
                    return;
                }
                None => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
            };

            for event in events {
                match event {
                    SseEvent::Done => break 'read,
                    SseEvent::Data(data) => match parse(&data) {
                        Ok(Some(fragment)) if !fragment.is_empty() => {
                            fragments += 1;
                            if tx.send(Ok(fragment)).await.is_err() {
                                // Receiver dropped, stop reading
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(failure) => {
                            let _ = tx.send(Err(failure)).await;
                            return;
                        }
                    },
                }
            }

            if at_eof {
                break;
            }
        }

        tracing::debug!(provider, fragments, "Completion stream finished");
    });

    Box::pin(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serve SSE headers and one event, then stall without closing. Reports
    /// whether the client hung up within `wait`.
    async fn stalled_sse_server(
        payload: &'static str,
        wait: std::time::Duration,
    ) -> (String, tokio::task::JoinHandle<bool>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/stream", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return true;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let event = format!("data: {}\n\n", payload);
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
                event.len(),
                event
            );
            socket.write_all(head.as_bytes()).await.unwrap();

            let hung_up = async {
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            };
            tokio::time::timeout(wait, hung_up).await.is_ok()
        });

        (url, server)
    }

    #[tokio::test]
    async fn test_dropping_stream_closes_stalled_connection() {
        let (url, server) = stalled_sse_server("hello", std::time::Duration::from_secs(5)).await;

        let response = reqwest::Client::new().get(&url).send().await.unwrap();
        let mut stream = fragment_stream(response, "Test", |data| Ok(Some(data.to_string())));

        assert_eq!(stream.next().await.unwrap().unwrap(), "hello");
        let stalled = tokio::time::timeout(std::time::Duration::from_millis(200), stream.next()).await;
        assert!(stalled.is_err());

        drop(stream);
        assert!(server.await.unwrap(), "connection still open after the stream was dropped");
    }

    #[tokio::test]
    async fn test_session_timeout_releases_streamed_connection() {
        use crate::session::{ConversationSession, SessionSettings};
        use crate::{ChatError, OpenRouterClient};

        let (url, server) = stalled_sse_server(
            r#"{"choices":[{"delta":{"content":"Take the"}}]}"#,
            std::time::Duration::from_secs(5),
        )
        .await;
        let base_url = url.trim_end_matches("/stream");
        let client = OpenRouterClient::new(reqwest::Client::new(), base_url, "key", "", "EcoBot");

        let settings = SessionSettings {
            stream: true,
            request_timeout: std::time::Duration::from_secs(1),
            ..SessionSettings::default()
        };
        let mut session = ConversationSession::new(std::sync::Arc::new(client), settings).unwrap();

        let err = session.send("Trains or planes?").await.unwrap_err();
        assert!(matches!(err, ChatError::Network));
        assert!(server.await.unwrap(), "connection still open after the send timed out");
    }

    #[test]
    fn test_decoder_splits_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_string()),
                SseEvent::Data("{\"b\":2}".to_string()),
            ]
        );
    }

    #[test]
    fn test_decoder_buffers_partial_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"tok").is_empty());
        let events = decoder.push(b"en\":\"hi\"}\n");
        assert_eq!(events, vec![SseEvent::Data("{\"token\":\"hi\"}".to_string())]);
    }

    #[test]
    fn test_decoder_keeps_split_utf8_intact() {
        let text = "data: caf\u{e9}\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = text.len() - 2;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&text[..split]).is_empty());
        let events = decoder.push(&text[split..]);
        assert_eq!(events, vec![SseEvent::Data("caf\u{e9}".to_string())]);
    }

    #[test]
    fn test_decoder_recognizes_done_and_skips_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": OPENROUTER PROCESSING\n\nevent: ping\ndata: [DONE]\n");
        assert_eq!(events, vec![SseEvent::Done]);
    }

    #[test]
    fn test_decoder_handles_crlf() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: x\r\n\r\n");
        assert_eq!(events, vec![SseEvent::Data("x".to_string())]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some(SseEvent::Data("tail".to_string())));
        assert_eq!(decoder.finish(), None);
    }
}
