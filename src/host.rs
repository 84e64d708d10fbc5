//! Collaborator interface provided by the embedding runtime
//!
//! The loader never interprets library source itself. Environment detection,
//! the built-in allow-list, raw code execution (native `require`-equivalent
//! or browser script/fetch injection), and the out-of-process checkpoint
//! delegate are all supplied by the embedding runtime through [`RuntimeHost`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LoaderError;

/// A callable symbol exposed by a loaded library.
pub type LibraryFunction = Arc<dyn Fn(&[Value]) -> Result<Value, LoaderError> + Send + Sync>;

/// A single export of a loaded module.
#[derive(Clone)]
pub enum Export {
    Function(LibraryFunction),
    Value(Value),
}

impl Export {
    pub fn as_function(&self) -> Option<&LibraryFunction> {
        match self {
            Export::Function(f) => Some(f),
            Export::Value(_) => None,
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Function(_) => f.write_str("Export::Function(..)"),
            Export::Value(v) => write!(f, "Export::Value({v})"),
        }
    }
}

/// Raw result of executing a library's source: its named exports plus the
/// source text (kept so dependency metadata can be recovered from preserved
/// comments after execution).
#[derive(Debug, Clone, Default)]
pub struct LoadedModule {
    pub exports: HashMap<String, Export>,
    pub source: Option<String>,
}

impl LoadedModule {
    /// Look up a function-typed export by name.
    pub fn function(&self, name: &str) -> Option<&LibraryFunction> {
        self.exports.get(name).and_then(Export::as_function)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.function(name).is_some()
    }
}

/// Execution environment the runtime detected for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Native host process with filesystem and module resolution.
    NativeHost,
    /// Browser page running standalone.
    BrowserStandalone,
    /// Browser page behind a control bus (orchestrated iframe/worker).
    BrowserControlBus,
    /// Remote-orchestrated worker; non-builtin loads must go through the
    /// out-of-process checkpoint delegate.
    RemoteWorker,
}

/// Capabilities the embedding runtime provides to the loader.
#[async_trait]
pub trait RuntimeHost: Send + Sync {
    /// Which environment this runtime instance is executing in.
    fn environment(&self) -> Environment;

    /// Built-in allow-list check. Returns the fixed relative path the bare
    /// name is rewritten to, or `None` if the name is not a builtin.
    fn builtin_path(&self, name: &str) -> Option<PathBuf>;

    fn is_builtin(&self, name: &str) -> bool {
        self.builtin_path(name).is_some()
    }

    /// Host module resolution heuristic for local/npm-style names
    /// (no scheme). Returns the resolved entry file, or `None`.
    fn resolve_module(&self, name: &str) -> Option<PathBuf>;

    /// Execute a library file from the native filesystem
    /// (`require`-equivalent).
    async fn execute_file(&self, path: &Path) -> Result<LoadedModule, LoaderError>;

    /// Execute raw library source text fetched from a remote source.
    /// `name` identifies the library for diagnostics.
    async fn execute_source(&self, name: &str, source: &str) -> Result<LoadedModule, LoaderError>;

    /// Browser script/fetch injection for a concrete URL.
    async fn inject_remote(&self, url: &str) -> Result<LoadedModule, LoaderError>;

    /// Delegate a load to the orchestrating process (sandboxed/remote
    /// execution contexts).
    async fn checkpoint_load(&self, name: &str) -> Result<LoadedModule, LoaderError>;
}
