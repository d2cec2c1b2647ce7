//! Byte-stream stdio emulated over the message channel.
//!
//! The channel primitive only pushes discrete messages; the embedded server
//! expects to read and write bytes. This adapter pairs the input queue
//! (emulated stdin) with a frame assembler (emulated stdout) to close that
//! gap, and is testable on its own, without a worker around it.

use lspbridge_frame::error::Result;
use lspbridge_frame::FrameAssembler;

use crate::queue::InputQueue;

/// Emulated stdin/stdout for one embedded server.
#[derive(Default)]
pub struct StdioChannel {
    input: InputQueue,
    output: FrameAssembler,
}

impl StdioChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one protocol message for the emulated stdin. True means the
    /// read loop must be (re)started.
    pub fn push_input(&mut self, message: impl Into<String>) -> bool {
        self.input.enqueue(message)
    }

    /// Record that the server finished constructing. True means buffered
    /// input should start the read loop immediately.
    pub fn mark_server_ready(&mut self) -> bool {
        self.input.mark_server_ready()
    }

    /// Mark the read loop as running.
    pub fn begin_read_loop(&mut self) {
        self.input.start_listening();
    }

    /// Next stdin frame, or `None` on the underflow that ends the read loop.
    pub fn next_stdin(&mut self) -> Option<String> {
        self.input.pull()
    }

    /// Accept bytes the server wrote to stdout. Returns every protocol
    /// message completed by this write, in order.
    pub fn write_stdout(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.output.write(bytes)
    }

    pub fn is_listening(&self) -> bool {
        self.input.is_listening()
    }
}
