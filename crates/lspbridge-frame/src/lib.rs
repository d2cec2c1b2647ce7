//! Content-Length framing and envelope multiplexing for sandboxed stdio.
//!
//! This is the wire layer of lspbridge. Protocol messages cross the
//! host↔sandbox boundary in two shapes:
//! - A `Content-Length`-prefixed frame, reassembled incrementally from an
//!   arbitrarily chunked byte stream
//! - A tagged [`Envelope`] separating raw protocol text from out-of-band
//!   control traffic on the shared message channel
//!
//! No partial reads, no buffer management in user code.

pub mod assembler;
pub mod codec;
pub mod envelope;
pub mod error;

pub use assembler::FrameAssembler;
pub use codec::{encode_frame, encode_stdin_frame, CONTENT_SEPARATOR, HEADER_PREFIX};
pub use envelope::{Command, ControlMessage, Envelope, SENTINEL};
pub use error::{EnvelopeError, FrameError, Result};
