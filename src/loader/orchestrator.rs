//! Load orchestrator
//!
//! Entry point for library loading. Sequences dependency-first loading,
//! deduplicates in-flight work per canonical name, and walks preference
//! lists. The load-state table is the single source of truth for "is this
//! name being/been loaded": concurrent requesters for the same canonical
//! name converge on one underlying operation, and a library's capabilities
//! never become observable before every transitive dependency has loaded.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::adapter::ModuleAdapter;
use crate::capability::CapabilityRegistry;
use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::host::RuntimeHost;
use crate::metadata::MetadataExtractor;
use crate::reference::{canonical_name, split_candidates};
use crate::registry::cache::PackageCache;
use crate::registry::fetch::{HttpTransport, PackageFetcher, ReqwestTransport};
use crate::registry::resolver::RegistryResolver;
use crate::loader::resolver::SourceResolver;

/// Load state of a canonical library name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

/// Declared dependency edges recorded as loads complete. Edge A -> B means
/// "A declares B as a dependency".
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    fn record(&mut self, library: &str, dependencies: Vec<String>) {
        self.edges.insert(library.to_string(), dependencies);
    }

    pub fn dependencies_of(&self, library: &str) -> Option<&Vec<String>> {
        self.edges.get(library)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &String> {
        self.edges.keys()
    }
}

type LoadOutcome = Option<Result<(), String>>;

enum LoadSlot {
    Loading(watch::Receiver<LoadOutcome>),
    Loaded,
    Failed(String),
}

enum Claim {
    AlreadyLoaded,
    Wait(watch::Receiver<LoadOutcome>),
    Run(watch::Sender<LoadOutcome>),
}

/// Library load orchestrator.
pub struct LibraryLoader {
    capabilities: Arc<CapabilityRegistry>,
    resolver: SourceResolver,
    metadata: MetadataExtractor,
    states: Mutex<HashMap<String, LoadSlot>>,
    graph: Mutex<DependencyGraph>,
}

impl LibraryLoader {
    /// Create a loader with the real HTTP transport.
    pub fn new(
        host: Arc<dyn RuntimeHost>,
        capabilities: Arc<CapabilityRegistry>,
        config: LoaderConfig,
    ) -> Result<Self, LoaderError> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(host, capabilities, config, transport))
    }

    /// Create a loader over an explicit transport (tests use a scripted one).
    pub fn with_transport(
        host: Arc<dyn RuntimeHost>,
        capabilities: Arc<CapabilityRegistry>,
        config: LoaderConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let cache = match &config.cache_root {
            Some(root) => PackageCache::new(root.clone()),
            None => {
                let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                PackageCache::discover(&start)
            }
        };
        let registry = RegistryResolver::new(
            Arc::clone(&transport),
            config.publisher_registry_url.clone(),
            config.max_redirects,
        );
        let fetcher = PackageFetcher::new(
            Arc::clone(&transport),
            cache,
            config.mirror_base_url.clone(),
            config.max_redirects,
        );
        let resolver = SourceResolver::new(
            host,
            registry,
            fetcher,
            transport,
            config.max_redirects,
        );
        let metadata = MetadataExtractor::new(Arc::clone(&capabilities));
        Self {
            capabilities,
            resolver,
            metadata,
            states: Mutex::new(HashMap::new()),
            graph: Mutex::new(DependencyGraph::default()),
        }
    }

    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    /// Load a library by reference. A comma-separated reference is an
    /// ordered preference list: candidates are attempted in order, the first
    /// success returns immediately, and if all fail the error names the full
    /// candidate list and wraps the last candidate's error.
    pub async fn load(&self, reference: &str, alias: Option<&str>) -> Result<(), LoaderError> {
        let candidates = split_candidates(reference);
        match candidates.len() {
            0 => Err(LoaderError::Resolution(format!(
                "empty library reference '{reference}'"
            ))),
            1 => self
                .load_candidate(&candidates[0], alias, &[])
                .await
                .map_err(|e| e.with_reference(&candidates[0])),
            _ => {
                let mut last = None;
                for candidate in &candidates {
                    match self.load_candidate(candidate, alias, &[]).await {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            warn!("Candidate '{}' failed: {}", candidate, e);
                            last = Some(e);
                        }
                    }
                }
                let last = last.unwrap_or_else(|| {
                    LoaderError::Resolution("no loadable candidate".to_string())
                });
                Err(LoaderError::AllCandidatesFailed {
                    candidates: candidates.join(", "),
                    last: Box::new(last),
                })
            }
        }
    }

    /// Current load state for a reference's canonical name.
    pub async fn state(&self, reference: &str) -> LoadState {
        let canonical = canonical_name(reference);
        match self.states.lock().await.get(&canonical) {
            None => LoadState::NotLoaded,
            Some(LoadSlot::Loading(_)) => LoadState::Loading,
            Some(LoadSlot::Loaded) => LoadState::Loaded,
            Some(LoadSlot::Failed(_)) => LoadState::Failed,
        }
    }

    /// Snapshot of the recorded dependency graph.
    pub async fn dependency_graph(&self) -> DependencyGraph {
        self.graph.lock().await.clone()
    }

    /// Load a single (non-list) candidate. `chain` is the ancestry of the
    /// current dependency walk; re-entering it is a circular declaration and
    /// fails fast rather than deadlocking on the in-flight slot.
    fn load_candidate<'a>(
        &'a self,
        reference: &'a str,
        alias: Option<&'a str>,
        chain: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(), LoaderError>> + Send + 'a>> {
        Box::pin(async move {
            let canonical = canonical_name(reference);

            if chain.contains(&canonical) {
                let mut path = chain.to_vec();
                path.push(canonical);
                return Err(LoaderError::CircularDependency(path.join(" -> ")));
            }

            let claim = {
                let mut states = self.states.lock().await;
                match states.get(&canonical) {
                    Some(LoadSlot::Loaded) => Claim::AlreadyLoaded,
                    Some(LoadSlot::Loading(rx)) => Claim::Wait(rx.clone()),
                    // A previous failure does not pin the name: a fresh
                    // request may retry.
                    Some(LoadSlot::Failed(_)) | None => {
                        let (tx, rx) = watch::channel(None);
                        states.insert(canonical.clone(), LoadSlot::Loading(rx));
                        Claim::Run(tx)
                    }
                }
            };

            match claim {
                Claim::AlreadyLoaded => Ok(()),
                Claim::Wait(mut rx) => {
                    debug!("Awaiting in-flight load of '{}'", canonical);
                    loop {
                        let outcome = rx.borrow_and_update().clone();
                        if let Some(result) = outcome {
                            return result.map_err(LoaderError::LoadFailed);
                        }
                        if rx.changed().await.is_err() {
                            // The running task was dropped before publishing
                            // an outcome. Release the slot so a later request
                            // starts fresh instead of waiting forever.
                            let mut states = self.states.lock().await;
                            let stale = matches!(
                                states.get(&canonical),
                                Some(LoadSlot::Loading(current)) if current.same_channel(&rx)
                            );
                            if stale {
                                states.insert(
                                    canonical.clone(),
                                    LoadSlot::Failed("in-flight load abandoned".to_string()),
                                );
                            }
                            return Err(LoaderError::LoadFailed(format!(
                                "in-flight load of '{canonical}' was abandoned"
                            )));
                        }
                    }
                }
                Claim::Run(tx) => {
                    let result = self.perform_load(reference, &canonical, alias, chain).await;
                    {
                        let mut states = self.states.lock().await;
                        match &result {
                            Ok(()) => states.insert(canonical.clone(), LoadSlot::Loaded),
                            Err(e) => {
                                states.insert(canonical.clone(), LoadSlot::Failed(e.to_string()))
                            }
                        };
                    }
                    let _ = tx.send(Some(
                        result.as_ref().map(|_| ()).map_err(|e| e.to_string()),
                    ));
                    result
                }
            }
        })
    }

    async fn perform_load(
        &self,
        reference: &str,
        canonical: &str,
        alias: Option<&str>,
        chain: &[String],
    ) -> Result<(), LoaderError> {
        info!("Loading library: {}", reference);

        let module = self.resolver.resolve(reference).await?;
        let metadata = self.metadata.extract(canonical, &module).await?;

        // A declared detection function that cannot be confirmed after
        // execution means the library cannot be confirmed initialized;
        // partial success is not success.
        if let Some(name) = &metadata.detection_function {
            if !module.has_function(name) && self.capabilities.detection(name).is_none() {
                return Err(LoaderError::Metadata(format!(
                    "detection function '{name}' is not available after executing '{reference}'"
                )));
            }
        }

        self.graph
            .lock()
            .await
            .record(canonical, metadata.dependencies.keys().cloned().collect());

        // Depth-first, dependency-before-dependent: every declared
        // dependency completes before this library's capabilities register.
        if !metadata.dependencies.is_empty() {
            let mut chain = chain.to_vec();
            chain.push(canonical.to_string());
            for (dependency, tag) in &metadata.dependencies {
                let dep_reference = match tag {
                    Some(tag) if !dependency.contains('@') => format!("{dependency}@{tag}"),
                    _ => dependency.clone(),
                };
                debug!("Library '{}' requires '{}'", canonical, dep_reference);
                self.load_candidate(&dep_reference, None, &chain).await?;
            }
        }

        ModuleAdapter::register(
            &self.capabilities,
            canonical,
            alias,
            &module,
            metadata.detection_function.as_deref(),
        );
        info!("Library loaded: {}", canonical);
        Ok(())
    }
}
