//! Shared test doubles: a scripted HTTP transport and a mock runtime host
//! that "executes" a simple line-oriented library fixture format.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use serde_json::Value;

use rexx_loader::{
    CapabilityRegistry, Environment, Export, HttpResponse, HttpTransport, LibraryFunction,
    LibraryLoader, LoadedModule, LoaderConfig, LoaderError, RuntimeHost,
};

/// Install a process-wide test-writer subscriber so loader logs show up
/// under `--nocapture`. Safe to call from every test helper.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

#[derive(Clone)]
enum Scripted {
    Response(HttpResponse),
    /// Never resolves; simulates an in-flight request that outlives the
    /// requesting task.
    Hang,
}

/// Scripted HTTP transport with per-URL responses and a request log.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Scripted::Response(HttpResponse {
                status,
                body: body.as_bytes().to_vec(),
                location: None,
            }),
        );
    }

    pub fn route_redirect(&self, url: &str, location: &str) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Scripted::Response(HttpResponse {
                status: 302,
                body: Vec::new(),
                location: Some(location.to_string()),
            }),
        );
    }

    /// Script a URL whose request never completes.
    pub fn route_hang(&self, url: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Scripted::Hang);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, LoaderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(url.to_string());
        let scripted = self.routes.lock().unwrap().get(url).cloned();
        match scripted {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Ok(HttpResponse {
                status: 404,
                body: Vec::new(),
                location: None,
            }),
        }
    }
}

type ExecuteHook = Box<dyn Fn(&str) + Send + Sync>;

/// Mock runtime host. Library fixtures are line-oriented:
///
/// ```text
/// /*! @rexxjs-meta=MY_META */
/// function: someFunction
/// detect: MY_META {"dependencies": ["./dep.rexx"]}
/// value: answer = 42
/// fail!
/// ```
///
/// `function:` exports a no-op function, `detect:` exports a function
/// returning the given JSON, `value:` exports a plain value, and `fail!`
/// makes execution throw. The raw text is carried as the module source so
/// comment-based metadata extraction sees it.
pub struct MockHost {
    environment: Environment,
    builtins: Mutex<HashMap<String, PathBuf>>,
    modules: Mutex<HashMap<String, PathBuf>>,
    injected: Mutex<HashMap<String, String>>,
    executions: AtomicUsize,
    executed: Mutex<Vec<String>>,
    checkpoints: Mutex<Vec<String>>,
    on_execute: Mutex<Option<ExecuteHook>>,
}

impl MockHost {
    pub fn new(environment: Environment) -> Arc<Self> {
        Arc::new(Self {
            environment,
            builtins: Mutex::new(HashMap::new()),
            modules: Mutex::new(HashMap::new()),
            injected: Mutex::new(HashMap::new()),
            executions: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            checkpoints: Mutex::new(Vec::new()),
            on_execute: Mutex::new(None),
        })
    }

    pub fn native() -> Arc<Self> {
        Self::new(Environment::NativeHost)
    }

    pub fn add_builtin(&self, name: &str, path: &Path) {
        self.builtins
            .lock()
            .unwrap()
            .insert(name.to_string(), path.to_path_buf());
    }

    pub fn add_module(&self, name: &str, path: &Path) {
        self.modules
            .lock()
            .unwrap()
            .insert(name.to_string(), path.to_path_buf());
    }

    /// Script a URL for browser-style injection.
    pub fn add_injectable(&self, url: &str, source: &str) {
        self.injected
            .lock()
            .unwrap()
            .insert(url.to_string(), source.to_string());
    }

    pub fn set_on_execute(&self, hook: ExecuteHook) {
        *self.on_execute.lock().unwrap() = Some(hook);
    }

    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn checkpoints(&self) -> Vec<String> {
        self.checkpoints.lock().unwrap().clone()
    }

    fn run(&self, name: &str, source: &str) -> Result<LoadedModule, LoaderError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(name.to_string());
        if let Some(hook) = self.on_execute.lock().unwrap().as_ref() {
            hook(name);
        }
        parse_library(source)
    }
}

#[async_trait]
impl RuntimeHost for MockHost {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn builtin_path(&self, name: &str) -> Option<PathBuf> {
        self.builtins.lock().unwrap().get(name).cloned()
    }

    fn resolve_module(&self, name: &str) -> Option<PathBuf> {
        self.modules.lock().unwrap().get(name).cloned()
    }

    async fn execute_file(&self, path: &Path) -> Result<LoadedModule, LoaderError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| LoaderError::NotFound(format!("{}: {e}", path.display())))?;
        self.run(&path.display().to_string(), &source)
    }

    async fn execute_source(&self, name: &str, source: &str) -> Result<LoadedModule, LoaderError> {
        self.run(name, source)
    }

    async fn inject_remote(&self, url: &str) -> Result<LoadedModule, LoaderError> {
        let source = self
            .injected
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| LoaderError::Network(format!("no injectable script at {url}")))?;
        self.run(url, &source)
    }

    async fn checkpoint_load(&self, name: &str) -> Result<LoadedModule, LoaderError> {
        self.checkpoints.lock().unwrap().push(name.to_string());
        Ok(LoadedModule::default())
    }
}

/// Parse the fixture format described on [`MockHost`].
pub fn parse_library(source: &str) -> Result<LoadedModule, LoaderError> {
    let mut module = LoadedModule {
        exports: HashMap::new(),
        source: Some(source.to_string()),
    };
    for line in source.lines() {
        let line = line.trim();
        if line == "fail!" {
            return Err(LoaderError::Execution("library source threw".to_string()));
        } else if let Some(name) = line.strip_prefix("function:") {
            let f: LibraryFunction = Arc::new(|_args: &[Value]| Ok(Value::Null));
            module
                .exports
                .insert(name.trim().to_string(), Export::Function(f));
        } else if let Some(rest) = line.strip_prefix("detect:") {
            let rest = rest.trim();
            let (name, json) = rest.split_once(' ').unwrap_or((rest, "null"));
            let value: Value = serde_json::from_str(json.trim()).unwrap_or(Value::Null);
            let f: LibraryFunction = Arc::new(move |_args: &[Value]| Ok(value.clone()));
            module
                .exports
                .insert(name.trim().to_string(), Export::Function(f));
        } else if let Some(rest) = line.strip_prefix("value:") {
            if let Some((name, json)) = rest.split_once('=') {
                let value: Value = serde_json::from_str(json.trim()).unwrap_or(Value::Null);
                module
                    .exports
                    .insert(name.trim().to_string(), Export::Value(value));
            }
        }
    }
    Ok(module)
}

/// Loader wired to a mock host and transport, with its cache rooted in a
/// caller-owned temp directory.
pub fn loader_with(
    host: Arc<MockHost>,
    transport: Arc<MockTransport>,
    cache_root: &Path,
) -> (Arc<LibraryLoader>, Arc<CapabilityRegistry>) {
    init_tracing();
    let capabilities = Arc::new(CapabilityRegistry::new());
    let config = LoaderConfig {
        publisher_registry_url: "https://pub.example/publishers.txt".to_string(),
        mirror_base_url: "https://mirror.example".to_string(),
        cache_root: Some(cache_root.to_path_buf()),
        max_redirects: 5,
    };
    let loader = Arc::new(LibraryLoader::with_transport(
        host,
        Arc::clone(&capabilities),
        config,
        transport,
    ));
    (loader, capabilities)
}
