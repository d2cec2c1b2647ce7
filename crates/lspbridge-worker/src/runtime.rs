//! The sandbox's private filesystem and interpreter seam.

use std::collections::HashMap;
use std::future::Future;

use crate::error::RuntimeError;

/// State owned exclusively by the sandbox context.
///
/// Nothing outside the sandbox mutates this state directly; it changes only
/// in response to the commands the sandbox receives. Provisioning, archive
/// fetches, and code execution suspend the worker, so they are async.
pub trait SandboxRuntime: Send + 'static {
    /// Provision the environment. Runs to completion before the server is
    /// constructed.
    fn initialize(&mut self) -> impl Future<Output = Result<(), RuntimeError>> + Send;

    /// Write a named file into the private filesystem.
    fn write_file(&mut self, name: &str, contents: &str) -> Result<(), RuntimeError>;

    /// Fetch an archive and unpack its entries into the private filesystem.
    fn unpack_archive(&mut self, url: &str) -> impl Future<Output = Result<(), RuntimeError>> + Send;

    /// Execute a chunk of code in the sandboxed interpreter.
    fn execute(&mut self, code: &str) -> impl Future<Output = Result<(), RuntimeError>> + Send;
}

/// In-memory runtime: a file map, archives keyed by URL, and a log of
/// executed code chunks.
///
/// Archives are registered up front with [`MemoryRuntime::with_archive`], so
/// populating the filesystem never touches the network.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    files: HashMap<String, String>,
    archives: HashMap<String, Vec<(String, String)>>,
    executed: Vec<String>,
    initialized: bool,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an archive's entries under a URL.
    pub fn with_archive(
        mut self,
        url: impl Into<String>,
        entries: Vec<(String, String)>,
    ) -> Self {
        self.archives.insert(url.into(), entries);
        self
    }

    /// Contents of a file in the private filesystem.
    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Code chunks executed so far, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl SandboxRuntime for MemoryRuntime {
    async fn initialize(&mut self) -> Result<(), RuntimeError> {
        self.initialized = true;
        Ok(())
    }

    fn write_file(&mut self, name: &str, contents: &str) -> Result<(), RuntimeError> {
        tracing::debug!(name, bytes = contents.len(), "writing sandbox file");
        self.files.insert(name.to_string(), contents.to_string());
        Ok(())
    }

    async fn unpack_archive(&mut self, url: &str) -> Result<(), RuntimeError> {
        let entries = self
            .archives
            .get(url)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownArchive { url: url.to_string() })?;
        tracing::debug!(url, entries = entries.len(), "unpacking archive");
        self.files.extend(entries);
        Ok(())
    }

    async fn execute(&mut self, code: &str) -> Result<(), RuntimeError> {
        if code.trim().is_empty() {
            return Err(RuntimeError::Interpreter("empty program".to_string()));
        }
        self.executed.push(code.to_string());
        Ok(())
    }
}
