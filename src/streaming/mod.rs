use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio::time::{timeout, Duration};
use tracing::{trace, warn};

use crate::error::PredictorError;
use crate::models::openai::{ChatCompletionChunk, ChunkDelta};

// ==================================================================================================
// Frame Parsing
// ==================================================================================================

/// Prefix of every event line
pub const DATA_MARKER: &str = "data:";

/// Payload of the terminal sentinel frame
pub const DONE_SENTINEL: &str = "[DONE]";

/// Parses a chat-completion event stream into frame deltas.
///
/// Raw bytes are buffered until a newline arrives. Splitting happens on the
/// `\n` byte, which never occurs inside a multi-byte UTF-8 sequence, so
/// characters split across transport chunks are reassembled before decoding.
///
/// Only `data:` lines are candidates. Blank lines, comments, `event:` lines and
/// the `[DONE]` sentinel are dropped. A candidate whose payload is not valid
/// JSON is logged and skipped.
#[derive(Debug, Default, Clone)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed bytes into the parser and extract the deltas of all complete lines
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ChunkDelta> {
        self.buffer.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(delta) = parse_line(&line) {
                deltas.push(delta);
            }
        }

        deltas
    }

    /// Parse whatever is left once the transport closes
    pub fn finalize(&mut self) -> Vec<ChunkDelta> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest).into_iter().collect()
    }
}

/// Parse one raw line. Returns `None` for anything that is not a usable frame.
fn parse_line(raw: &[u8]) -> Option<ChunkDelta> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();

    if line.is_empty() {
        return None;
    }

    let payload = line.strip_prefix(DATA_MARKER)?.trim();
    if payload == DONE_SENTINEL {
        return None;
    }

    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => chunk.into_first_delta(),
        Err(e) => {
            warn!(
                "Failed to parse stream frame: {} - {}",
                e,
                payload.chars().take(100).collect::<String>()
            );
            None
        }
    }
}

// ==================================================================================================
// Frame Stream
// ==================================================================================================

/// Turn a byte stream into a lazy stream of frame deltas.
///
/// The first chunk must arrive within `first_token_timeout` when one is given.
/// A transport error ends the stream with that error.
pub fn parse_frames<S, E>(
    byte_stream: S,
    first_token_timeout: Option<Duration>,
) -> impl Stream<Item = Result<ChunkDelta, PredictorError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<PredictorError> + Send + 'static,
{
    async_stream::stream! {
        let mut byte_stream = Box::pin(byte_stream);
        let mut parser = SseParser::new();
        let mut first = true;

        loop {
            let next = match (first, first_token_timeout) {
                (true, Some(limit)) => match timeout(limit, byte_stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            "[FirstTokenTimeout] Model did not respond within {}s",
                            limit.as_secs()
                        );
                        yield Err(PredictorError::FirstTokenTimeout(limit.as_secs()));
                        return;
                    }
                },
                _ => byte_stream.next().await,
            };
            first = false;

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    let err: PredictorError = e.into();
                    yield Err(err);
                    return;
                }
                None => break,
            };
            trace!(bytes = chunk.len(), "Received stream chunk");

            for delta in parser.feed(&chunk) {
                yield Ok(delta);
            }
        }

        for delta in parser.finalize() {
            yield Ok(delta);
        }
    }
}

/// Frame stream of a streaming chat-completion response
pub fn response_frames(
    response: reqwest::Response,
    first_token_timeout: Option<Duration>,
) -> impl Stream<Item = Result<ChunkDelta, PredictorError>> {
    parse_frames(response.bytes_stream(), first_token_timeout)
}
