//! The embedded server seam.
//!
//! The interpreter behind the server is opaque to the bridge: the worker
//! hands it framed stdin payloads and routes whatever it writes to stdout
//! back through the frame assembler.

use crate::error::RuntimeError;

/// A diagnostics pass requested for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsRequest {
    /// Document the pass applies to. Also the debounce key: a newer request
    /// for the same subject supersedes an unfired older one.
    pub subject: String,
    /// Whether the request was triggered by a save.
    pub saved: bool,
}

/// Side effects a server may request while handling input.
#[derive(Debug, Default)]
pub struct ServerActions {
    diagnostics: Vec<DiagnosticsRequest>,
}

impl ServerActions {
    /// Request a debounced diagnostics pass for `subject`.
    pub fn request_diagnostics(&mut self, subject: impl Into<String>, saved: bool) {
        self.diagnostics.push(DiagnosticsRequest { subject: subject.into(), saved });
    }

    pub(crate) fn take_diagnostics(&mut self) -> Vec<DiagnosticsRequest> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// A language server driven through the emulated stdio.
pub trait StdioServer: Send + 'static {
    /// Construct the server inside the sandboxed interpreter. Runs after
    /// environment provisioning and before the read loop may start.
    fn initialize(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Feed one stdin payload, terminated with the newline the line-oriented
    /// reader supplies. Returns whatever the server wrote to stdout.
    fn feed(&mut self, input: &[u8], actions: &mut ServerActions) -> Vec<u8>;

    /// Run a debounced diagnostics pass. Output takes the same stdout path
    /// as [`StdioServer::feed`].
    fn diagnose(&mut self, request: &DiagnosticsRequest) -> Vec<u8> {
        let _ = request;
        Vec::new()
    }
}
