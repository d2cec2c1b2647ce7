//! Duplex transport presented to the protocol client.

use std::sync::Arc;

use lspbridge_frame::Envelope;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::bridge::WorkerBridge;
use crate::error::Result;

/// Writer/reader pair over the bridge.
///
/// The writer serializes outbound messages into the sandbox's stdin
/// emulation; the reader forwards inbound protocol messages to a handler and
/// silently discards control traffic.
#[derive(Clone)]
pub struct WorkerTransport {
    bridge: Arc<WorkerBridge>,
}

impl WorkerTransport {
    pub(crate) fn new(bridge: Arc<WorkerBridge>) -> Self {
        Self { bridge }
    }

    /// Serialize and send one outbound protocol message.
    pub fn write<T: Serialize>(&self, message: &T) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.bridge.send_message(text)
    }

    /// Forward every inbound protocol message, decoded, to `handler`, in
    /// arrival order. The returned handle detaches the handler when dropped.
    pub fn listen<F>(&self, mut handler: F) -> ReaderSubscription
    where
        F: FnMut(serde_json::Value) + Send + 'static,
    {
        let mut subscription = self.bridge.subscribe();
        let task = tokio::spawn(async move {
            while let Some(envelope) = subscription.recv().await {
                let Envelope::Data(text) = envelope else {
                    continue;
                };
                match serde_json::from_str(&text) {
                    Ok(value) => handler(value),
                    Err(error) => {
                        tracing::warn!(%error, "dropping undecodable protocol message");
                    }
                }
            }
        });
        ReaderSubscription { task }
    }
}

/// Disposable handle for an attached reader; dropping it detaches the
/// handler and its bridge subscription.
pub struct ReaderSubscription {
    task: JoinHandle<()>,
}

impl Drop for ReaderSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
