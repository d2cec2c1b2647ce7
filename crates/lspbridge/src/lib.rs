//! Sandboxed language-server bridge.
//!
//! lspbridge runs a JSON-RPC-over-stdio language server inside an isolated
//! execution context that has no real OS pipes — only asynchronous message
//! passing — and exposes it to a protocol client as one duplex transport.
//!
//! # Crate Structure
//!
//! - [`frame`] — Content-Length framing and control/data envelope multiplexing
//! - [`worker`] — the sandboxed execution context: stdio emulation, private
//!   runtime, debounced diagnostics
//! - [`client`] — host-side bridge, transport adapter, session orchestration

/// Re-export frame types.
pub mod frame {
    pub use lspbridge_frame::*;
}

/// Re-export worker types.
pub mod worker {
    pub use lspbridge_worker::*;
}

/// Re-export client types.
pub mod client {
    pub use lspbridge_client::*;
}
