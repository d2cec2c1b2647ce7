use bytes::{Buf, BytesMut};

use crate::codec::{CONTENT_SEPARATOR, HEADER_PREFIX};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reassembles complete message payloads from an arbitrarily chunked byte
/// stream.
///
/// Handles partial delivery internally — callers always get complete,
/// UTF-8-decoded messages, in arrival order. The buffer grows as needed and
/// compacts on every consumption, so inputs are not bounded by any fixed
/// capacity.
pub struct FrameAssembler {
    buf: BytesMut,
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Scanning for the next `Content-Length: ` header.
    AwaitingHeader,
    /// Header consumed; scanning for the separator (`in_body: false`), then
    /// accumulating the declared number of content bytes (`in_body: true`).
    AwaitingContent { declared: usize, in_body: bool },
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: State::AwaitingHeader,
        }
    }

    /// Feed a chunk of arbitrary size and boundary alignment.
    ///
    /// Returns every message this chunk completed, in arrival order. A single
    /// call may yield zero, one, or many messages.
    pub fn write(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        while self.step(&mut out)? {}
        Ok(out)
    }

    /// Bytes buffered but not yet emitted.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn step(&mut self, out: &mut Vec<String>) -> Result<bool> {
        match self.state {
            State::AwaitingHeader => self.consume_header(),
            State::AwaitingContent { declared, in_body: false } => self.consume_separator(declared),
            State::AwaitingContent { declared, in_body: true } => self.consume_content(declared, out),
        }
    }

    fn consume_header(&mut self) -> Result<bool> {
        let Some(pos) = find(&self.buf, HEADER_PREFIX.as_bytes()) else {
            // Anything that cannot still turn into the header prefix is
            // discarded; servers flush with stray newlines between frames.
            self.discard_retaining_prefix_of(HEADER_PREFIX.as_bytes());
            return Ok(false);
        };
        self.buf.advance(pos);

        let digits_start = HEADER_PREFIX.len();
        let mut digits_end = digits_start;
        while digits_end < self.buf.len() && self.buf[digits_end].is_ascii_digit() {
            digits_end += 1;
        }
        if digits_end == self.buf.len() {
            // The digit run may continue in the next chunk.
            return Ok(false);
        }

        let declared = std::str::from_utf8(&self.buf[digits_start..digits_end])
            .ok()
            .and_then(|digits| digits.parse::<usize>().ok())
            .ok_or_else(|| FrameError::InvalidLength {
                header: self.header_for_diagnostics(),
            })?;

        self.buf.advance(digits_end);
        self.state = State::AwaitingContent { declared, in_body: false };
        Ok(true)
    }

    fn consume_separator(&mut self, declared: usize) -> Result<bool> {
        let Some(pos) = find(&self.buf, CONTENT_SEPARATOR) else {
            // Additional header lines (content type and friends) sit between
            // the length header and the separator; they carry nothing we need.
            self.discard_retaining_prefix_of(CONTENT_SEPARATOR);
            return Ok(false);
        };
        self.buf.advance(pos + CONTENT_SEPARATOR.len());
        self.state = State::AwaitingContent { declared, in_body: true };
        Ok(true)
    }

    fn consume_content(&mut self, declared: usize, out: &mut Vec<String>) -> Result<bool> {
        if self.buf.len() < declared {
            return Ok(false);
        }
        let content = self.buf.split_to(declared);
        let message = String::from_utf8(content.to_vec())?;
        tracing::trace!(bytes = declared, "assembled frame");
        out.push(message);
        self.state = State::AwaitingHeader;
        Ok(true)
    }

    /// Drop buffered bytes that can no longer become `pattern`, keeping the
    /// longest tail that is still a prefix of it.
    fn discard_retaining_prefix_of(&mut self, pattern: &[u8]) {
        let keep = longest_suffix_prefix(&self.buf, pattern);
        let discard = self.buf.len() - keep;
        if discard > 0 {
            self.buf.advance(discard);
        }
    }

    fn header_for_diagnostics(&self) -> String {
        let end = find(&self.buf, b"\n").unwrap_or(self.buf.len());
        String::from_utf8_lossy(&self.buf[..end]).into_owned()
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Length of the longest suffix of `haystack` that is a proper prefix of
/// `needle`.
fn longest_suffix_prefix(haystack: &[u8], needle: &[u8]) -> usize {
    for len in (1..needle.len()).rev() {
        if len <= haystack.len() && haystack[haystack.len() - len..] == needle[..len] {
            return len;
        }
    }
    0
}
