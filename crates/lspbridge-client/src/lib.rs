//! The host execution context.
//!
//! This is the side the protocol client lives on. The bridge multiplexes
//! protocol data and lifecycle commands over the single channel to the
//! sandbox; the transport presents that as a conventional duplex
//! reader/writer pair; the session owns the sandbox's lifetime.

pub mod bridge;
pub mod error;
pub mod session;
pub mod transport;

pub use bridge::{BridgeSubscription, WorkerBridge};
pub use error::{ClientError, Result};
pub use session::{LanguageClient, SandboxSession};
pub use transport::{ReaderSubscription, WorkerTransport};
