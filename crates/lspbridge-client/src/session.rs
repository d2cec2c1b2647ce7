//! Sandbox lifetime and client wiring.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lspbridge_frame::Command;
use lspbridge_worker::channel::pair;
use lspbridge_worker::{SandboxRuntime, SandboxWorker, StdioServer, WorkerError};
use tokio::task::JoinHandle;

use crate::bridge::WorkerBridge;
use crate::error::Result;
use crate::transport::WorkerTransport;

/// A protocol client that connects over the worker transport.
///
/// Starting the connection is the client's own contract; the session only
/// hands over the transport once the sandbox is ready.
pub trait LanguageClient {
    fn start(&mut self, transport: WorkerTransport) -> impl Future<Output = Result<()>> + Send;
}

/// Owns a running sandbox and exposes its lifecycle operations.
///
/// Every operation resolves only when the sandbox reports the matching
/// completion.
pub struct SandboxSession {
    bridge: Arc<WorkerBridge>,
    worker: JoinHandle<std::result::Result<(), WorkerError>>,
}

impl std::fmt::Debug for SandboxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxSession").finish_non_exhaustive()
    }
}

impl SandboxSession {
    /// Spawn the sandbox and wait until it has finished initializing.
    pub async fn launch<S, R>(server: S, runtime: R) -> Result<Self>
    where
        S: StdioServer,
        R: SandboxRuntime,
    {
        Self::launch_worker(SandboxWorker::new, server, runtime).await
    }

    /// Like [`SandboxSession::launch`], with an explicit diagnostics
    /// quiescence window.
    pub async fn launch_with_quiescence<S, R>(
        server: S,
        runtime: R,
        quiescence: Duration,
    ) -> Result<Self>
    where
        S: StdioServer,
        R: SandboxRuntime,
    {
        Self::launch_worker(
            |server, runtime, channel| {
                SandboxWorker::with_quiescence(server, runtime, channel, quiescence)
            },
            server,
            runtime,
        )
        .await
    }

    async fn launch_worker<S, R, F>(build: F, server: S, runtime: R) -> Result<Self>
    where
        S: StdioServer,
        R: SandboxRuntime,
        F: FnOnce(S, R, lspbridge_worker::PushChannel) -> SandboxWorker<S, R>,
    {
        let (host_end, sandbox_end) = pair();
        let worker = tokio::spawn(build(server, runtime, sandbox_end).run());
        let bridge = Arc::new(WorkerBridge::new(host_end));
        bridge.ready().await?;
        tracing::debug!("sandbox session established");
        Ok(Self { bridge, worker })
    }

    /// Write a named file into the sandbox's private filesystem.
    pub async fn write_file(
        &self,
        name: impl Into<String>,
        contents: impl Into<String>,
    ) -> Result<()> {
        self.bridge
            .command(Command::WriteFile { name: name.into(), contents: contents.into() })
            .await
    }

    /// Fetch an archive and unpack it into the sandbox filesystem.
    pub async fn populate_from_archive(&self, url: impl Into<String>) -> Result<()> {
        self.bridge.command(Command::UnpackZip { url: url.into() }).await
    }

    /// Execute a chunk of code in the sandboxed interpreter.
    pub async fn execute(&self, code: impl Into<String>) -> Result<()> {
        self.bridge.command(Command::ExecutePython { code: code.into() }).await
    }

    /// Transport carrying protocol traffic to and from the sandbox.
    pub fn transport(&self) -> WorkerTransport {
        WorkerTransport::new(Arc::clone(&self.bridge))
    }

    /// Hand the transport to the client and delegate connection startup to
    /// its own start contract.
    pub async fn start_client<C: LanguageClient>(&self, client: &mut C) -> Result<()> {
        client.start(self.transport()).await
    }

    /// Tear the sandbox down.
    pub fn shutdown(self) {
        self.worker.abort();
    }
}
