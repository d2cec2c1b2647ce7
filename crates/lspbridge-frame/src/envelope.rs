//! Control/data envelope for the single host↔sandbox channel.
//!
//! Every value crossing the channel is either raw protocol text or
//! out-of-band control traffic. The envelope carries that distinction as a
//! typed discriminant, so protocol payloads are free to begin with the
//! sentinel character. The sentinel-prefixed textual grammar survives as the
//! wire encoding used for diagnostics and cross-process transports.

use serde::Deserialize;

use crate::error::EnvelopeError;

/// Reserved marker introducing control traffic in the wire encoding.
pub const SENTINEL: char = '@';

/// Wire name: write a named file into the sandbox filesystem.
pub const CMD_WRITE_FILE: &str = "write-file";
/// Wire name: fetch a remote archive and unpack it into the filesystem.
pub const CMD_UNPACK_ZIP: &str = "unpack-zip";
/// Wire name: execute code in the sandboxed interpreter.
pub const CMD_EXECUTE_PYTHON: &str = "execute-python";
/// Wire name: command completion.
pub const SIG_DONE: &str = "done";
/// Wire name: one-time sandbox readiness signal.
pub const SIG_INITIALIZATION_FINISHED: &str = "initialization-finished";

/// One value crossing the host↔sandbox channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Out-of-band control traffic.
    Control(ControlMessage),
    /// Raw protocol text routed to the stdio emulation.
    Data(String),
}

/// Control traffic multiplexed alongside protocol data.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Host→sandbox lifecycle command with its injected sequence index.
    Command { index: u64, command: Command },
    /// Sandbox→host completion for the command with the same index.
    Done { index: u64 },
    /// Sandbox→host readiness signal, sent exactly once.
    InitializationFinished,
}

/// Lifecycle commands executed against the sandbox runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    WriteFile { name: String, contents: String },
    UnpackZip { url: String },
    ExecutePython { code: String },
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::WriteFile { .. } => CMD_WRITE_FILE,
            Command::UnpackZip { .. } => CMD_UNPACK_ZIP,
            Command::ExecutePython { .. } => CMD_EXECUTE_PYTHON,
        }
    }

    fn body(&self, index: u64) -> serde_json::Value {
        match self {
            Command::WriteFile { name, contents } => {
                serde_json::json!({ "name": name, "contents": contents, "_idx": index })
            }
            Command::UnpackZip { url } => serde_json::json!({ "url": url, "_idx": index }),
            Command::ExecutePython { code } => serde_json::json!({ "code": code, "_idx": index }),
        }
    }
}

#[derive(Deserialize)]
struct WriteFileBody {
    name: String,
    contents: String,
    #[serde(rename = "_idx")]
    idx: u64,
}

#[derive(Deserialize)]
struct UnpackZipBody {
    url: String,
    #[serde(rename = "_idx")]
    idx: u64,
}

#[derive(Deserialize)]
struct ExecutePythonBody {
    code: String,
    #[serde(rename = "_idx")]
    idx: u64,
}

impl Envelope {
    pub fn data(text: impl Into<String>) -> Self {
        Envelope::Data(text.into())
    }

    pub fn command(index: u64, command: Command) -> Self {
        Envelope::Control(ControlMessage::Command { index, command })
    }

    pub fn done(index: u64) -> Self {
        Envelope::Control(ControlMessage::Done { index })
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Envelope::Control(_))
    }

    /// Encode to the textual wire grammar.
    pub fn encode(&self) -> String {
        match self {
            Envelope::Data(text) => text.clone(),
            Envelope::Control(ControlMessage::Done { index }) => {
                format!("{SENTINEL}{SIG_DONE}:{index}")
            }
            Envelope::Control(ControlMessage::InitializationFinished) => {
                format!("{SENTINEL}{SIG_INITIALIZATION_FINISHED}")
            }
            Envelope::Control(ControlMessage::Command { index, command }) => {
                format!("{SENTINEL}{}:{}", command.name(), command.body(*index))
            }
        }
    }

    /// Classify one wire value: sentinel-prefixed control traffic or data.
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        let Some(rest) = raw.strip_prefix(SENTINEL) else {
            return Ok(Envelope::Data(raw.to_string()));
        };
        if rest == SIG_INITIALIZATION_FINISHED {
            return Ok(Envelope::Control(ControlMessage::InitializationFinished));
        }
        let (name, payload) = rest.split_once(':').ok_or_else(|| EnvelopeError::UnknownCommand {
            name: rest.to_string(),
        })?;
        match name {
            SIG_DONE => {
                let index = payload.parse::<u64>().map_err(|_| EnvelopeError::BadIndex {
                    raw: payload.to_string(),
                })?;
                Ok(Envelope::done(index))
            }
            CMD_WRITE_FILE => {
                let body: WriteFileBody = serde_json::from_str(payload)?;
                Ok(Envelope::command(
                    body.idx,
                    Command::WriteFile { name: body.name, contents: body.contents },
                ))
            }
            CMD_UNPACK_ZIP => {
                let body: UnpackZipBody = serde_json::from_str(payload)?;
                Ok(Envelope::command(body.idx, Command::UnpackZip { url: body.url }))
            }
            CMD_EXECUTE_PYTHON => {
                let body: ExecutePythonBody = serde_json::from_str(payload)?;
                Ok(Envelope::command(body.idx, Command::ExecutePython { code: body.code }))
            }
            other => Err(EnvelopeError::UnknownCommand { name: other.to_string() }),
        }
    }
}
