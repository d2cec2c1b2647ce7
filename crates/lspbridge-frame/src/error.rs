/// Errors that can occur while reassembling frames from the byte stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header carried no parseable decimal content length.
    ///
    /// Fatal: the transport is in-process and assumed reliable, so no
    /// resynchronization is attempted.
    #[error("no parseable content length in header {header:?}")]
    InvalidLength { header: String },

    /// Frame content was not valid UTF-8.
    #[error("frame content is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Errors that can occur while decoding the envelope wire grammar.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Sentinel-prefixed value with an unrecognized command name.
    #[error("unknown control command {name:?}")]
    UnknownCommand { name: String },

    /// Control payload failed to deserialize.
    #[error("malformed control payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Completion signal with a non-numeric index.
    #[error("malformed completion index {raw:?}")]
    BadIndex { raw: String },
}

pub type Result<T> = std::result::Result<T, FrameError>;
