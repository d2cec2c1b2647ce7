//! Host side of the execution-context bridge.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lspbridge_frame::{Command, ControlMessage, Envelope};
use lspbridge_worker::channel::PushChannel;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{ClientError, Result};

/// Host endpoint multiplexing protocol data and lifecycle commands over the
/// single channel to the sandbox.
///
/// A router task classifies every inbound envelope: completions resolve
/// their one-shot listener, the readiness signal latches a watch, and the
/// full stream fans out to subscribers in arrival order. Control and data
/// traffic interleave arbitrarily; nothing here assumes temporal exclusivity
/// between the two kinds.
pub struct WorkerBridge {
    outbound: mpsc::UnboundedSender<Envelope>,
    next_index: AtomicU64,
    state: Arc<Mutex<RouterState>>,
    ready: watch::Receiver<bool>,
}

#[derive(Default)]
struct RouterState {
    pending: HashMap<u64, oneshot::Sender<()>>,
    subscribers: Vec<(u64, mpsc::UnboundedSender<Envelope>)>,
    next_subscriber: u64,
}

impl WorkerBridge {
    /// Take ownership of the host endpoint and start routing.
    pub fn new(channel: PushChannel) -> Self {
        let (outbound, mut inbound) = channel.split();
        let state = Arc::new(Mutex::new(RouterState::default()));
        let (ready_tx, ready_rx) = watch::channel(false);

        let router_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                route(&router_state, &ready_tx, envelope);
            }
            // The sandbox endpoint is gone: fail the waiters instead of
            // leaving them pending forever.
            let mut state = lock(&router_state);
            state.pending.clear();
            state.subscribers.clear();
        });

        Self { outbound, next_index: AtomicU64::new(0), state, ready: ready_rx }
    }

    /// Send one protocol message to the sandbox's stdin emulation.
    pub fn send_message(&self, text: impl Into<String>) -> Result<()> {
        self.outbound
            .send(Envelope::Data(text.into()))
            .map_err(|_| ClientError::WorkerGone)
    }

    /// Issue a lifecycle command and await its completion.
    ///
    /// The sequence index is assigned here, unique and strictly increasing
    /// for the bridge's lifetime, and the one-shot listener is torn down when
    /// the matching completion fires. There is no timeout.
    pub async fn command(&self, command: Command) -> Result<()> {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.state).pending.insert(index, tx);

        tracing::debug!(index, command = command.name(), "command dispatched");
        if self.outbound.send(Envelope::command(index, command)).is_err() {
            lock(&self.state).pending.remove(&index);
            return Err(ClientError::WorkerGone);
        }

        rx.await.map_err(|_| ClientError::WorkerGone)
    }

    /// Subscribe to every inbound envelope. Dropping the handle unsubscribes.
    pub fn subscribe(&self) -> BridgeSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.state);
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.push((id, tx));
        BridgeSubscription { id, state: Arc::clone(&self.state), rx }
    }

    /// Wait until the sandbox has signalled that initialization finished.
    pub async fn ready(&self) -> Result<()> {
        let mut ready = self.ready.clone();
        while !*ready.borrow() {
            ready.changed().await.map_err(|_| ClientError::WorkerGone)?;
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }
}

/// Handle for one inbound-traffic subscription.
pub struct BridgeSubscription {
    id: u64,
    state: Arc<Mutex<RouterState>>,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl BridgeSubscription {
    /// Next envelope; `None` once the bridge or sandbox is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

impl Drop for BridgeSubscription {
    fn drop(&mut self) {
        lock(&self.state).subscribers.retain(|(id, _)| *id != self.id);
    }
}

fn lock(state: &Mutex<RouterState>) -> MutexGuard<'_, RouterState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn route(state: &Mutex<RouterState>, ready: &watch::Sender<bool>, envelope: Envelope) {
    if tracing::enabled!(tracing::Level::TRACE) {
        tracing::trace!(wire = %envelope.encode(), "inbound envelope");
    }

    match &envelope {
        Envelope::Control(ControlMessage::Done { index }) => {
            let listener = lock(state).pending.remove(index);
            match listener {
                Some(tx) => {
                    tracing::debug!(index, "command completed");
                    let _ = tx.send(());
                }
                None => tracing::warn!(index, "completion for unknown command index"),
            }
        }
        Envelope::Control(ControlMessage::InitializationFinished) => {
            tracing::debug!("sandbox signalled readiness");
            let _ = ready.send(true);
        }
        Envelope::Control(ControlMessage::Command { index, .. }) => {
            tracing::warn!(index, "command envelope arrived on the host side");
        }
        Envelope::Data(_) => {}
    }

    // Subscribers see the full inbound stream and apply their own filtering.
    lock(state)
        .subscribers
        .retain(|(_, tx)| tx.send(envelope.clone()).is_ok());
}

#[cfg(test)]
mod tests {
    use lspbridge_worker::channel::pair;

    use super::*;

    /// Host bridge plus the raw sandbox endpoint to script against.
    fn bridge_pair() -> (WorkerBridge, PushChannel) {
        let (host, sandbox) = pair();
        (WorkerBridge::new(host), sandbox)
    }

    #[tokio::test]
    async fn completions_resolve_matching_callers_in_any_order() {
        let (bridge, mut sandbox) = bridge_pair();
        let bridge = Arc::new(bridge);

        let mut callers = Vec::new();
        for i in 0..4u64 {
            let bridge = Arc::clone(&bridge);
            callers.push(tokio::spawn(async move {
                bridge.command(Command::ExecutePython { code: format!("chunk {i}") }).await
            }));
        }

        // Collect all four command envelopes, then complete in reverse order.
        let mut indices = Vec::new();
        for _ in 0..4 {
            match sandbox.recv().await.expect("command should arrive") {
                Envelope::Control(ControlMessage::Command { index, .. }) => indices.push(index),
                other => panic!("unexpected envelope: {other:?}"),
            }
        }
        indices.sort_unstable();
        assert_eq!(indices, [0, 1, 2, 3]);
        for index in indices.into_iter().rev() {
            sandbox.send(Envelope::done(index)).expect("done should send");
        }

        for caller in callers {
            caller
                .await
                .expect("caller task should join")
                .expect("each caller resolves exactly once");
        }
    }

    #[tokio::test]
    async fn indices_increase_strictly() {
        let (bridge, mut sandbox) = bridge_pair();
        let bridge = Arc::new(bridge);

        for expected in 0..3u64 {
            let caller = {
                let bridge = Arc::clone(&bridge);
                tokio::spawn(async move {
                    bridge.command(Command::ExecutePython { code: "x".to_string() }).await
                })
            };
            match sandbox.recv().await.expect("command should arrive") {
                Envelope::Control(ControlMessage::Command { index, .. }) => {
                    assert_eq!(index, expected);
                    sandbox.send(Envelope::done(index)).expect("done should send");
                }
                other => panic!("unexpected envelope: {other:?}"),
            }
            caller.await.expect("caller task should join").expect("command completes");
        }
    }

    #[tokio::test]
    async fn unknown_completion_index_is_ignored() {
        let (bridge, mut sandbox) = bridge_pair();
        sandbox.send(Envelope::done(999)).expect("done should send");

        // Bridge still works afterwards.
        let bridge = Arc::new(bridge);
        let caller = {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                bridge.command(Command::ExecutePython { code: "x".to_string() }).await
            })
        };
        match sandbox.recv().await.expect("command should arrive") {
            Envelope::Control(ControlMessage::Command { index, .. }) => {
                sandbox.send(Envelope::done(index)).expect("done should send");
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
        caller.await.expect("caller task should join").expect("command completes");
    }

    #[tokio::test]
    async fn data_fans_out_to_subscribers_in_order() {
        let (bridge, sandbox) = bridge_pair();
        let mut subscription = bridge.subscribe();

        sandbox.send(Envelope::data("one")).expect("send should succeed");
        sandbox.send(Envelope::done(7)).expect("send should succeed");
        sandbox.send(Envelope::data("two")).expect("send should succeed");

        assert_eq!(subscription.recv().await, Some(Envelope::data("one")));
        assert_eq!(subscription.recv().await, Some(Envelope::done(7)));
        assert_eq!(subscription.recv().await, Some(Envelope::data("two")));
    }

    #[tokio::test]
    async fn dropping_a_subscription_unsubscribes() {
        let (bridge, sandbox) = bridge_pair();
        let first = bridge.subscribe();
        let mut second = bridge.subscribe();
        drop(first);

        sandbox.send(Envelope::data("after-drop")).expect("send should succeed");
        assert_eq!(second.recv().await, Some(Envelope::data("after-drop")));
        assert_eq!(lock(&second.state).subscribers.len(), 1);
    }

    #[tokio::test]
    async fn ready_latches_on_the_initialization_signal() {
        let (bridge, sandbox) = bridge_pair();
        assert!(!bridge.is_ready());

        sandbox
            .send(Envelope::Control(ControlMessage::InitializationFinished))
            .expect("send should succeed");
        bridge.ready().await.expect("readiness should latch");
        assert!(bridge.is_ready());

        // A second await returns immediately.
        bridge.ready().await.expect("still ready");
    }

    #[tokio::test]
    async fn dead_sandbox_fails_pending_commands() {
        let (bridge, mut sandbox) = bridge_pair();

        let pending = {
            let bridge = Arc::new(bridge);
            let caller = Arc::clone(&bridge);
            tokio::spawn(async move {
                caller.command(Command::ExecutePython { code: "x".to_string() }).await
            })
        };

        // Wait until the command is in flight, then kill the sandbox.
        sandbox.recv().await.expect("command should arrive");
        drop(sandbox);

        let err = pending.await.expect("caller task should join").expect_err("worker is gone");
        assert!(matches!(err, ClientError::WorkerGone));
    }

    #[tokio::test]
    async fn send_message_reaches_the_sandbox_as_data() {
        let (bridge, mut sandbox) = bridge_pair();
        bridge.send_message(r#"{"id":1}"#).expect("send should succeed");
        assert_eq!(sandbox.recv().await, Some(Envelope::data(r#"{"id":1}"#)));
    }
}
