//! Server-sent event framing.

use std::time::Duration;

use tracing::trace;

use super::event::DEFAULT_EVENT;
use crate::stream::LineBuffer;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; `message` when the server sent none.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// Value of the last `id:` field seen, if any.
    pub id: Option<String>,
}

/// Incremental `text/event-stream` parser.
///
/// Feed it raw chunks as they arrive; a frame is emitted once its
/// terminating blank line has been read. Comment lines (`:`) are skipped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    lines: LineBuffer,
    event: Option<String>,
    data: Vec<String>,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        for line in self.lines.push(chunk) {
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Reconnect delay most recently requested by the server.
    #[must_use]
    pub fn retry_hint(&self) -> Option<Duration> {
        self.retry
    }

    /// Id of the most recent event, sent back as `Last-Event-ID` on reconnect.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Drops any half-received frame; used when the connection ends.
    pub fn reset_pending(&mut self) {
        let discarded = self.lines.discard_partial();
        if discarded > 0 || !self.data.is_empty() {
            trace!(discarded, "dropping incomplete event frame");
        }
        self.event = None;
        self.data.clear();
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(millis) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(millis));
                }
            }
            other => trace!(field = %other, "ignoring unknown event-stream field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.last_event_id.clone(),
        })
    }
}
