//! End-to-end demo session against a built-in stand-in server.

use std::time::Duration;

use clap::Args;
use lspbridge_client::{
    LanguageClient, ReaderSubscription, Result as ClientResult, SandboxSession, WorkerTransport,
};
use lspbridge_frame::codec::encode_frame;
use lspbridge_frame::FrameAssembler;
use lspbridge_worker::{DiagnosticsRequest, MemoryRuntime, ServerActions, StdioServer};
use tokio::sync::mpsc;

use crate::cmd::CliResult;

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Diagnostics quiescence window in milliseconds.
    #[arg(long, default_value_t = 200)]
    quiescence_ms: u64,
}

pub fn run(args: DemoArgs) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
    runtime.block_on(demo_session(Duration::from_millis(args.quiescence_ms)))
}

async fn demo_session(quiescence: Duration) -> CliResult<()> {
    let runtime = MemoryRuntime::new().with_archive(
        "demo:stdlib",
        vec![("lib/util.py".to_string(), "def helper():\n    return 42\n".to_string())],
    );

    let session =
        SandboxSession::launch_with_quiescence(DemoServer::default(), runtime, quiescence).await?;
    session.write_file("/code.py", "a = 1 + 2").await?;
    session.populate_from_archive("demo:stdlib").await?;
    session.execute("import util").await?;
    tracing::info!("lifecycle commands completed");

    let (responses_tx, mut responses) = mpsc::unbounded_channel();
    let mut client = DemoClient { responses: responses_tx, reader: None };
    session.start_client(&mut client).await?;

    // A burst of didChange traffic exercises the debounced diagnostics path:
    // only the last change in the window produces a publish.
    let transport = session.transport();
    for version in 1..=3 {
        transport.write(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didChange",
            "params": {"textDocument": {"uri": "file:///code.py", "version": version}},
        }))?;
    }

    while let Some(message) = responses.recv().await {
        println!("{message}");
        if message["method"] == "textDocument/publishDiagnostics" {
            break;
        }
    }

    session.shutdown();
    Ok(())
}

/// Stand-in language server: answers every request with an echo result and
/// publishes one diagnostics notification per debounced change burst.
#[derive(Default)]
struct DemoServer {
    assembler: FrameAssembler,
}

impl StdioServer for DemoServer {
    fn feed(&mut self, input: &[u8], actions: &mut ServerActions) -> Vec<u8> {
        let messages = match self.assembler.write(input) {
            Ok(messages) => messages,
            Err(error) => {
                tracing::warn!(%error, "dropping undecodable stdin payload");
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for message in messages {
            let Ok(request) =
                serde_json::from_str::<serde_json::Value>(message.trim_end_matches('\n'))
            else {
                continue;
            };

            if request["method"] == "textDocument/didChange" {
                if let Some(uri) = request["params"]["textDocument"]["uri"].as_str() {
                    actions.request_diagnostics(uri, false);
                }
                continue;
            }
            if let Some(id) = request.get("id") {
                let response = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {"echo": request["method"]},
                });
                out.extend_from_slice(encode_frame(&response.to_string()).as_bytes());
            }
        }
        out
    }

    fn diagnose(&mut self, request: &DiagnosticsRequest) -> Vec<u8> {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": {"uri": request.subject, "diagnostics": []},
        });
        encode_frame(&notification.to_string()).into_bytes()
    }
}

struct DemoClient {
    responses: mpsc::UnboundedSender<serde_json::Value>,
    reader: Option<ReaderSubscription>,
}

impl LanguageClient for DemoClient {
    async fn start(&mut self, transport: WorkerTransport) -> ClientResult<()> {
        let responses = self.responses.clone();
        self.reader = Some(transport.listen(move |value| {
            let _ = responses.send(value);
        }));
        transport.write(&serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {},
        }))
    }
}
