//! Message-passing endpoints connecting the host and sandbox contexts.

use lspbridge_frame::Envelope;
use tokio::sync::mpsc;

/// The other execution context dropped its endpoint.
#[derive(Debug, thiserror::Error)]
#[error("peer execution context is gone")]
pub struct ChannelClosed;

/// One end of the bidirectional host↔sandbox channel.
///
/// Delivery preserves send order per direction; no ordering is promised
/// between control and data envelopes beyond that. The channel is unbounded:
/// bounding memory under adversarial input is out of scope.
pub struct PushChannel {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

/// Create a connected pair of endpoints, one per execution context.
pub fn pair() -> (PushChannel, PushChannel) {
    let (host_tx, sandbox_rx) = mpsc::unbounded_channel();
    let (sandbox_tx, host_rx) = mpsc::unbounded_channel();
    (
        PushChannel { tx: host_tx, rx: host_rx },
        PushChannel { tx: sandbox_tx, rx: sandbox_rx },
    )
}

impl PushChannel {
    /// Post an envelope to the other context.
    pub fn send(&self, envelope: Envelope) -> Result<(), ChannelClosed> {
        self.tx.send(envelope).map_err(|_| ChannelClosed)
    }

    /// Receive the next envelope; `None` once the other context is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Split into raw send and receive halves.
    pub fn split(
        self,
    ) -> (mpsc::UnboundedSender<Envelope>, mpsc::UnboundedReceiver<Envelope>) {
        (self.tx, self.rx)
    }
}
