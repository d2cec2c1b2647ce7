//! Frame encoders and wire constants.
//!
//! Wire format:
//! ```text
//! ┌─────────────────────────┬────────────┬──────────────────┐
//! │ Content-Length: <N>     │ \r\n\r\n   │ Payload          │
//! │ (ASCII decimal)         │            │ (N bytes UTF-8)  │
//! └─────────────────────────┴────────────┴──────────────────┘
//! ```

/// Header prefix every frame starts with.
pub const HEADER_PREFIX: &str = "Content-Length: ";

/// Separator between the header block and the frame content.
pub const CONTENT_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Encode a message as a frame with the literal content length.
///
/// This is the sandbox→host form: the declared length is exactly the UTF-8
/// byte length of the text.
pub fn encode_frame(text: &str) -> String {
    format!("{HEADER_PREFIX}{}\r\n\r\n{text}", text.len())
}

/// Encode a message as a stdin frame for the emulated line-oriented reader.
///
/// The declared length is one byte larger than the text: the line reader
/// supplies a trailing newline when it hands the payload to the server, and
/// the declared length covers it.
pub fn encode_stdin_frame(text: &str) -> String {
    format!("{HEADER_PREFIX}{}\r\n\r\n{text}", text.len() + 1)
}
