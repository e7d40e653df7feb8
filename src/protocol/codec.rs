//! Line codec for agent output streams.
//!
//! Frames newline-delimited output with a maximum line length to prevent
//! memory exhaustion from an unterminated or runaway line. Bytes are decoded
//! permissively: invalid UTF-8 sequences are replaced rather than treated as
//! fatal, so a misbehaving agent can never kill a reader with bad bytes.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::{AppError, Result};

/// Maximum line length accepted by the codec: 1 MiB.
///
/// Lines exceeding this limit cause [`LineCodec::decode`] to return
/// [`AppError::Protocol`]; the oversized line is discarded and framing
/// resumes at the next newline.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited frame decoder with lossy UTF-8 decoding.
#[derive(Debug)]
pub struct LineCodec {
    max_line_bytes: usize,
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom maximum line length.
    #[must_use]
    pub fn with_max_length(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            discarding: false,
        }
    }

    /// Convert a raw frame (without its newline) into a `String`, replacing
    /// invalid UTF-8 sequences and stripping a trailing carriage return.
    fn decode_frame(frame: &[u8]) -> String {
        let frame = frame.strip_suffix(b"\r").unwrap_or(frame);
        String::from_utf8_lossy(frame).into_owned()
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            if let Some(pos) = src.iter().position(|b| *b == b'\n') {
                let frame = src.split_to(pos + 1);
                if self.discarding {
                    // Tail of a line that already exceeded the limit.
                    self.discarding = false;
                    continue;
                }
                if pos > self.max_line_bytes {
                    return Err(AppError::Protocol(format!(
                        "line too long: exceeded {} bytes",
                        self.max_line_bytes
                    )));
                }
                return Ok(Some(Self::decode_frame(&frame[..pos])));
            }

            if !self.discarding && src.len() > self.max_line_bytes {
                self.discarding = true;
                src.advance(src.len());
                return Err(AppError::Protocol(format!(
                    "line too long: exceeded {} bytes",
                    self.max_line_bytes
                )));
            }

            return Ok(None);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() || self.discarding {
            return Ok(None);
        }
        // Final line without a trailing newline.
        let frame = src.split_to(src.len());
        Ok(Some(Self::decode_frame(&frame)))
    }
}
