//! The sandboxed execution context.
//!
//! A sandbox has no real OS pipes; the only way in or out is asynchronous
//! message passing. This crate runs the server side of that arrangement: a
//! single cooperative task owning the private runtime, the embedded server,
//! and the stdio emulation that feeds it.

pub mod channel;
pub mod debounce;
pub mod error;
pub mod queue;
pub mod runtime;
pub mod server;
pub mod stdio;
pub mod worker;

pub use channel::{pair, ChannelClosed, PushChannel};
pub use debounce::{Debouncer, DEFAULT_QUIESCENCE};
pub use error::{Result, RuntimeError, WorkerError};
pub use queue::InputQueue;
pub use runtime::{MemoryRuntime, SandboxRuntime};
pub use server::{DiagnosticsRequest, ServerActions, StdioServer};
pub use stdio::StdioChannel;
pub use worker::SandboxWorker;
