// src/io/serial/line.rs
//
// Newline framing for the received byte stream. Bytes accumulate until a
// `\n` completes a line; a cap bounds the buffer so a peer that never sends
// a newline cannot grow it without limit.

/// Longest line accepted before a forced split.
pub const MAX_LINE_LEN: usize = 4096;

/// A line extracted from the stream. `incomplete` marks lines produced by
/// flush() (stream ended mid-line) or a forced split at the length cap.
#[derive(Clone, Debug, PartialEq)]
pub struct LineFrame {
    pub bytes: Vec<u8>,
    pub incomplete: bool,
}

pub struct LineFramer {
    buffer: Vec<u8>,
    max_length: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LEN)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        LineFramer {
            buffer: Vec::with_capacity(256),
            max_length,
        }
    }

    /// Feed raw bytes into the framer.
    /// Returns any lines completed by this chunk, newline included.
    pub fn feed(&mut self, data: &[u8]) -> Vec<LineFrame> {
        let mut frames = Vec::new();

        for &byte in data {
            self.buffer.push(byte);

            if byte == b'\n' {
                frames.push(LineFrame {
                    bytes: self.buffer.drain(..).collect(),
                    incomplete: false,
                });
            } else if self.buffer.len() >= self.max_length {
                // No newline within the cap - split so the buffer stays bounded
                frames.push(LineFrame {
                    bytes: self.buffer.drain(..).collect(),
                    incomplete: true,
                });
            }
        }

        frames
    }

    /// Flush any buffered partial line. Call when the stream ends.
    pub fn flush(&mut self) -> Option<LineFrame> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(LineFrame {
                bytes: self.buffer.drain(..).collect(),
                incomplete: true,
            })
        }
    }
}
