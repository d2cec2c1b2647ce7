/// Errors surfaced to the protocol client and the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The sandbox context is gone: its channel endpoints were dropped.
    ///
    /// Commands themselves carry no timeout — a completion that never
    /// arrives while the sandbox lives leaves its caller pending.
    #[error("sandbox worker is gone")]
    WorkerGone,

    /// JSON serialization of an outbound message failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The protocol client refused to start.
    #[error("client start failed: {0}")]
    ClientStart(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
