//! The sandbox's event loop.

use std::time::Duration;

use lspbridge_frame::{Command, ControlMessage, Envelope};
use tokio::sync::mpsc;

use crate::channel::PushChannel;
use crate::debounce::{Debouncer, DEFAULT_QUIESCENCE};
use crate::error::Result;
use crate::runtime::SandboxRuntime;
use crate::server::{DiagnosticsRequest, ServerActions, StdioServer};
use crate::stdio::StdioChannel;

/// The sandbox side of the bridge: one cooperative task owning the private
/// runtime, the embedded server, and the stdio emulation.
///
/// Sequencing is strict: environment provisioning completes fully before
/// server construction, which completes before the read loop may start. Only
/// then does the readiness signal go out.
pub struct SandboxWorker<S, R> {
    server: S,
    runtime: R,
    stdio: StdioChannel,
    channel: PushChannel,
    debouncer: Debouncer<DiagnosticsRequest>,
    fired: mpsc::UnboundedReceiver<DiagnosticsRequest>,
}

impl<S: StdioServer, R: SandboxRuntime> SandboxWorker<S, R> {
    pub fn new(server: S, runtime: R, channel: PushChannel) -> Self {
        Self::with_quiescence(server, runtime, channel, DEFAULT_QUIESCENCE)
    }

    /// Override the diagnostics quiescence window.
    pub fn with_quiescence(
        server: S,
        runtime: R,
        channel: PushChannel,
        quiescence: Duration,
    ) -> Self {
        let (debouncer, fired) = Debouncer::new(quiescence);
        Self { server, runtime, stdio: StdioChannel::new(), channel, debouncer, fired }
    }

    /// Run the sandbox until the host drops its endpoint.
    ///
    /// Failures are not caught here: a failed command aborts the task and the
    /// command's completion never arrives.
    pub async fn run(mut self) -> Result<()> {
        self.runtime.initialize().await?;
        self.server.initialize()?;
        if self.stdio.mark_server_ready() {
            self.run_read_loop()?;
        }
        self.channel.send(Envelope::Control(ControlMessage::InitializationFinished))?;
        tracing::info!("sandbox initialized");

        loop {
            tokio::select! {
                envelope = self.channel.recv() => {
                    match envelope {
                        Some(envelope) => self.handle_envelope(envelope).await?,
                        None => break,
                    }
                }
                Some(request) = self.fired.recv() => {
                    self.run_diagnostics(&request)?;
                }
            }
        }

        tracing::debug!("host endpoint dropped, sandbox shutting down");
        Ok(())
    }

    async fn handle_envelope(&mut self, envelope: Envelope) -> Result<()> {
        match envelope {
            Envelope::Data(message) => {
                if self.stdio.push_input(message) {
                    self.run_read_loop()?;
                }
                Ok(())
            }
            Envelope::Control(ControlMessage::Command { index, command }) => {
                self.run_command(command).await?;
                self.channel.send(Envelope::done(index))?;
                Ok(())
            }
            Envelope::Control(other) => {
                tracing::warn!(?other, "unexpected control message in sandbox");
                Ok(())
            }
        }
    }

    async fn run_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::WriteFile { name, contents } => {
                tracing::debug!(%name, "write-file");
                self.runtime.write_file(&name, &contents)?;
            }
            Command::UnpackZip { url } => {
                tracing::debug!(%url, "unpack-zip");
                self.runtime.unpack_archive(&url).await?;
            }
            Command::ExecutePython { code } => {
                tracing::debug!(bytes = code.len(), "execute-python");
                self.runtime.execute(&code).await?;
            }
        }
        Ok(())
    }

    /// The emulated blocking read loop, run inline on this task until the
    /// queue underflows.
    fn run_read_loop(&mut self) -> Result<()> {
        self.stdio.begin_read_loop();
        tracing::debug!("read loop started");
        while let Some(frame) = self.stdio.next_stdin() {
            // The line-oriented reader hands the payload over with a trailing
            // newline; the frame's declared length already covers it.
            let mut input = frame.into_bytes();
            input.push(b'\n');

            let mut actions = ServerActions::default();
            let output = self.server.feed(&input, &mut actions);
            self.forward_output(&output)?;
            for request in actions.take_diagnostics() {
                self.debouncer.schedule(request.subject.clone(), request);
            }
        }
        tracing::debug!("read loop drained");
        Ok(())
    }

    fn run_diagnostics(&mut self, request: &DiagnosticsRequest) -> Result<()> {
        let output = self.server.diagnose(request);
        self.forward_output(&output)
    }

    fn forward_output(&mut self, bytes: &[u8]) -> Result<()> {
        for message in self.stdio.write_stdout(bytes)? {
            self.channel.send(Envelope::Data(message))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use lspbridge_frame::codec::encode_frame;
    use lspbridge_frame::FrameAssembler;

    use super::*;
    use crate::channel::pair;
    use crate::error::{RuntimeError, WorkerError};
    use crate::runtime::MemoryRuntime;

    /// Echoes every request back, `lint:`-prefixed requests also schedule a
    /// diagnostics pass.
    #[derive(Default)]
    struct EchoServer {
        assembler: FrameAssembler,
    }

    impl StdioServer for EchoServer {
        fn feed(&mut self, input: &[u8], actions: &mut ServerActions) -> Vec<u8> {
            let messages = self.assembler.write(input).expect("test input frames are valid");
            let mut out = Vec::new();
            for message in messages {
                let line = message.trim_end_matches('\n');
                if let Some(subject) = line.strip_prefix("lint+save:") {
                    actions.request_diagnostics(subject, true);
                } else if let Some(subject) = line.strip_prefix("lint:") {
                    actions.request_diagnostics(subject, false);
                }
                out.extend_from_slice(encode_frame(&format!("echo:{line}")).as_bytes());
            }
            out
        }

        fn diagnose(&mut self, request: &DiagnosticsRequest) -> Vec<u8> {
            encode_frame(&format!("diag:{}:{}", request.subject, request.saved)).into_bytes()
        }
    }

    #[derive(Clone, Default)]
    struct ProbeRuntime {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl ProbeRuntime {
        fn push(&self, event: impl Into<String>) {
            self.events.lock().expect("events lock").push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().expect("events lock").clone()
        }
    }

    impl SandboxRuntime for ProbeRuntime {
        async fn initialize(&mut self) -> std::result::Result<(), RuntimeError> {
            self.push("initialize");
            Ok(())
        }

        fn write_file(&mut self, name: &str, contents: &str) -> std::result::Result<(), RuntimeError> {
            self.push(format!("write {name}={contents}"));
            Ok(())
        }

        async fn unpack_archive(&mut self, url: &str) -> std::result::Result<(), RuntimeError> {
            if url == "https://example.com/missing.zip" {
                return Err(RuntimeError::UnknownArchive { url: url.to_string() });
            }
            self.push(format!("unpack {url}"));
            Ok(())
        }

        async fn execute(&mut self, code: &str) -> std::result::Result<(), RuntimeError> {
            self.push(format!("execute {code}"));
            Ok(())
        }
    }

    fn spawn_worker(
        quiescence: Duration,
    ) -> (PushChannel, ProbeRuntime, tokio::task::JoinHandle<Result<()>>) {
        let (host, sandbox) = pair();
        let runtime = ProbeRuntime::default();
        let worker = SandboxWorker::with_quiescence(
            EchoServer::default(),
            runtime.clone(),
            sandbox,
            quiescence,
        );
        (host, runtime, tokio::spawn(worker.run()))
    }

    #[tokio::test]
    async fn signals_readiness_after_provisioning_and_construction() {
        let (mut host, runtime, _task) = spawn_worker(DEFAULT_QUIESCENCE);
        assert_eq!(
            host.recv().await,
            Some(Envelope::Control(ControlMessage::InitializationFinished))
        );
        assert_eq!(runtime.events(), ["initialize"]);
    }

    #[tokio::test]
    async fn echoes_protocol_data_through_the_stdio_emulation() {
        let (mut host, _runtime, _task) = spawn_worker(DEFAULT_QUIESCENCE);
        host.recv().await; // readiness

        host.send(Envelope::data(r#"{"id":1}"#)).expect("send should succeed");
        assert_eq!(host.recv().await, Some(Envelope::data(r#"echo:{"id":1}"#)));
    }

    #[tokio::test]
    async fn burst_of_messages_drains_in_order() {
        let (mut host, _runtime, _task) = spawn_worker(DEFAULT_QUIESCENCE);
        host.recv().await;

        for text in ["one", "two", "three"] {
            host.send(Envelope::data(text)).expect("send should succeed");
        }
        assert_eq!(host.recv().await, Some(Envelope::data("echo:one")));
        assert_eq!(host.recv().await, Some(Envelope::data("echo:two")));
        assert_eq!(host.recv().await, Some(Envelope::data("echo:three")));
    }

    #[tokio::test]
    async fn commands_complete_with_matching_indices() {
        let (mut host, runtime, _task) = spawn_worker(DEFAULT_QUIESCENCE);
        host.recv().await;

        let write = Command::WriteFile { name: "/code.py".to_string(), contents: "a = 1".to_string() };
        host.send(Envelope::command(0, write)).expect("send should succeed");
        host.send(Envelope::command(1, Command::ExecutePython { code: "run()".to_string() }))
            .expect("send should succeed");

        assert_eq!(host.recv().await, Some(Envelope::done(0)));
        assert_eq!(host.recv().await, Some(Envelope::done(1)));
        assert_eq!(runtime.events(), ["initialize", "write /code.py=a = 1", "execute run()"]);
    }

    #[tokio::test]
    async fn failed_command_aborts_the_worker_without_completion() {
        let (mut host, _runtime, task) = spawn_worker(DEFAULT_QUIESCENCE);
        host.recv().await;

        let unpack = Command::UnpackZip { url: "https://example.com/missing.zip".to_string() };
        host.send(Envelope::command(0, unpack)).expect("send should succeed");

        let err = task.await.expect("worker task should join").expect_err("command should fail");
        assert!(matches!(err, WorkerError::Runtime(RuntimeError::UnknownArchive { .. })));
        assert_eq!(host.recv().await, None);
    }

    #[tokio::test]
    async fn repeated_lint_requests_collapse_to_the_last_one() {
        let (mut host, _runtime, _task) = spawn_worker(Duration::from_millis(25));
        host.recv().await;

        host.send(Envelope::data("lint:file:///a.py")).expect("send should succeed");
        host.send(Envelope::data("lint:file:///a.py")).expect("send should succeed");
        host.send(Envelope::data("lint+save:file:///a.py")).expect("send should succeed");

        // Echoes come back immediately, one per request.
        for _ in 0..3 {
            let echoed = host.recv().await.expect("echo should arrive");
            assert!(matches!(echoed, Envelope::Data(text) if text.starts_with("echo:lint")));
        }

        // Only the final request's diagnostics pass fires.
        assert_eq!(host.recv().await, Some(Envelope::data("diag:file:///a.py:true")));
        let quiet = tokio::time::timeout(Duration::from_millis(100), host.recv()).await;
        assert!(quiet.is_err(), "no further diagnostics expected");
    }

    #[tokio::test]
    async fn worker_exits_cleanly_when_host_drops() {
        let (host, _runtime, task) = spawn_worker(DEFAULT_QUIESCENCE);
        drop(host);
        task.await.expect("worker task should join").expect("clean shutdown");
    }

    #[tokio::test]
    async fn runs_against_the_memory_runtime() {
        let (host_end, sandbox) = pair();
        let runtime = MemoryRuntime::new()
            .with_archive("demo:stdlib", vec![("lib/util.py".to_string(), "# util".to_string())]);
        let worker = SandboxWorker::new(EchoServer::default(), runtime, sandbox);
        let _task = tokio::spawn(worker.run());

        let mut host = host_end;
        host.recv().await; // readiness

        host.send(Envelope::command(0, Command::UnpackZip { url: "demo:stdlib".to_string() }))
            .expect("send should succeed");
        assert_eq!(host.recv().await, Some(Envelope::done(0)));
    }
}
