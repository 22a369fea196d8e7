//! Incremental frame decoder for the pipeline event stream.
//!
//! The run endpoint emits UTF-8 text frames separated by a blank line. Each
//! frame carries an `event:` line naming the event type and a `data:` line
//! with a JSON payload. Transport chunks arrive with arbitrary boundaries,
//! so the decoder buffers the unterminated tail and reassembles frames that
//! span chunks.

use tracing::debug;

/// Delimiter between frames on the wire.
const FRAME_DELIMITER: &str = "\n\n";

/// One complete frame: an event name and its raw JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

/// Stateful decoder turning transport chunks into complete frames.
///
/// Create one per run; the internal buffer only ever holds the bytes after
/// the last delimiter seen.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every frame it completed, in order.
    ///
    /// Frames missing the `event:` or `data:` line are dropped without
    /// affecting subsequent frames. The output is independent of how the
    /// byte stream was split into chunks.
    pub fn push(&mut self, chunk: &str) -> Vec<Frame> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find(FRAME_DELIMITER) {
            let raw: String = self.buffer.drain(..pos + FRAME_DELIMITER.len()).collect();
            let raw = &raw[..pos];
            match parse_frame(raw) {
                Some(frame) => frames.push(frame),
                None => {
                    if !raw.trim().is_empty() {
                        debug!(frame = raw, "Dropping malformed frame");
                    }
                }
            }
        }
        frames
    }

    /// Consumes the decoder at end of stream, returning the number of
    /// buffered bytes that never formed a complete frame.
    ///
    /// A conforming producer terminates every frame before closing, so a
    /// non-zero residue means a truncated frame was discarded.
    pub fn finish(self) -> usize {
        self.buffer.len()
    }
}

fn parse_frame(raw: &str) -> Option<Frame> {
    let mut event = None;
    let mut data = None;
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event.get_or_insert_with(|| rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.get_or_insert_with(|| rest.trim().to_string());
        }
    }
    Some(Frame {
        event: event?,
        data: data?,
    })
}
