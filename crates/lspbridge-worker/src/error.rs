use lspbridge_frame::FrameError;

use crate::channel::ChannelClosed;

/// Errors from the sandbox's private runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// No archive is available at the URL.
    #[error("no archive available at {url}")]
    UnknownArchive { url: String },

    /// The sandboxed interpreter rejected an operation.
    #[error("interpreter error: {0}")]
    Interpreter(String),
}

/// Errors that abort the sandbox worker task.
///
/// The worker does not catch or retry these; a failed command kills the task
/// and its completion never arrives.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("host context is gone: {0}")]
    HostGone(#[from] ChannelClosed),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
