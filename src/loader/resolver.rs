//! Source resolution and strategy dispatch
//!
//! Classifies a single candidate reference and routes it to the correct
//! loading strategy. The classification order is significant and must not be
//! reordered: `registry:` literals first, then the remote-worker checkpoint
//! delegation, then per-environment dispatch. Within the native-host loader:
//! builtin allow-list rewrite, host module resolution, namespace/module
//! references, and finally the generic remote strategies.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::LoaderError;
use crate::host::{Environment, LoadedModule, RuntimeHost};
use crate::reference::{classify, split_version, LibraryReference};
use crate::registry::fetch::{fetch_text, HttpTransport, PackageFetcher};
use crate::registry::resolver::RegistryResolver;

/// Routes a classified reference to its loading strategy.
pub struct SourceResolver {
    host: Arc<dyn RuntimeHost>,
    registry: RegistryResolver,
    fetcher: PackageFetcher,
    transport: Arc<dyn HttpTransport>,
    max_redirects: usize,
}

impl SourceResolver {
    pub fn new(
        host: Arc<dyn RuntimeHost>,
        registry: RegistryResolver,
        fetcher: PackageFetcher,
        transport: Arc<dyn HttpTransport>,
        max_redirects: usize,
    ) -> Self {
        Self {
            host,
            registry,
            fetcher,
            transport,
            max_redirects,
        }
    }

    /// Resolve and execute a single candidate reference.
    pub async fn resolve(&self, reference: &str) -> Result<LoadedModule, LoaderError> {
        // 1. `registry:` literals bypass all heuristics: straight to the
        //    registry, keyed by namespace/library.
        if reference.starts_with("registry:") {
            let LibraryReference::Registry {
                namespace,
                library,
                version,
            } = classify(reference)?
            else {
                return Err(LoaderError::Resolution(format!(
                    "malformed registry reference '{reference}'"
                )));
            };
            let url = self
                .registry
                .resolve(&namespace, &library, version.as_deref())
                .await?;
            return self.load_remote(&url).await;
        }

        // 2. Remote-orchestrated workers may only load builtins locally;
        //    everything else goes through the checkpoint delegate.
        if self.host.environment() == Environment::RemoteWorker && !self.host.is_builtin(reference)
        {
            debug!("Delegating '{}' to checkpoint in remote worker", reference);
            return self.host.checkpoint_load(reference).await;
        }

        // 3. Environment-specific loader.
        match self.host.environment() {
            Environment::NativeHost | Environment::RemoteWorker => {
                self.resolve_native(reference).await
            }
            Environment::BrowserStandalone | Environment::BrowserControlBus => {
                self.resolve_browser(reference).await
            }
        }
    }

    async fn resolve_native(&self, reference: &str) -> Result<LoadedModule, LoaderError> {
        match classify(reference)? {
            LibraryReference::LocalPath(path) => {
                let path = Path::new(&path);
                if !path.exists() {
                    return Err(LoaderError::NotFound(format!(
                        "local library file {} does not exist",
                        path.display()
                    )));
                }
                self.host.execute_file(path).await
            }
            LibraryReference::BareName(name) => self.resolve_bare_name(&name).await,
            LibraryReference::NamespaceModule {
                namespace,
                module,
                version,
            } => {
                // Host module resolution outranks the namespace/module
                // shape: a slash-carrying name the host resolves locally
                // (npm-style subpath) executes from disk and never reaches
                // the registry.
                if let Some(path) = self.host.resolve_module(reference) {
                    debug!("Host resolved '{}' to {}", reference, path.display());
                    return self.host.execute_file(&path).await;
                }
                let url = self
                    .registry
                    .resolve(&namespace, &module, version.as_deref())
                    .await?;
                self.load_remote(&url).await
            }
            LibraryReference::Registry {
                namespace,
                library,
                version,
            } => {
                let url = self
                    .registry
                    .resolve(&namespace, &library, version.as_deref())
                    .await?;
                self.load_remote(&url).await
            }
            LibraryReference::Url(url) => self.load_remote(&url).await,
        }
    }

    async fn resolve_bare_name(&self, name: &str) -> Result<LoadedModule, LoaderError> {
        // Builtin allow-list: rewritten to a fixed relative path.
        if let Some(path) = self.host.builtin_path(name) {
            debug!("Builtin '{}' at {}", name, path.display());
            return self.host.execute_file(&path).await;
        }

        // Scoped package names also match the namespace/module shape; they
        // route to host resolution, not the registry.
        if name.starts_with('@') && name.contains('/') {
            warn!(
                "Reference '{}' looks like a scoped package; using host module resolution",
                name
            );
        }

        // Host module resolution (local/npm-style lookup).
        if let Some(path) = self.host.resolve_module(name) {
            debug!("Host resolved '{}' to {}", name, path.display());
            return self.host.execute_file(&path).await;
        }

        // CDN-mirrored package, backed by the persistent cache.
        let (package, version) = split_version(name);
        let source = self
            .fetcher
            .resolve(package, version.unwrap_or("latest"))
            .await?;
        self.host.execute_source(name, &source).await
    }

    async fn resolve_browser(&self, reference: &str) -> Result<LoadedModule, LoaderError> {
        match classify(reference)? {
            LibraryReference::NamespaceModule {
                namespace,
                module,
                version,
            } => {
                let url = self
                    .registry
                    .resolve(&namespace, &module, version.as_deref())
                    .await?;
                self.host.inject_remote(&url).await
            }
            LibraryReference::Registry {
                namespace,
                library,
                version,
            } => {
                let url = self
                    .registry
                    .resolve(&namespace, &library, version.as_deref())
                    .await?;
                self.host.inject_remote(&url).await
            }
            // Local paths, bare names, and URLs all go through the host's
            // script/fetch injection in a browser.
            LibraryReference::LocalPath(target)
            | LibraryReference::BareName(target)
            | LibraryReference::Url(target) => self.host.inject_remote(&target).await,
        }
    }

    /// Hand a concrete URL to the environment-appropriate remote loader.
    async fn load_remote(&self, url: &str) -> Result<LoadedModule, LoaderError> {
        match self.host.environment() {
            Environment::NativeHost | Environment::RemoteWorker => {
                let source = fetch_text(self.transport.as_ref(), url, self.max_redirects).await?;
                self.host.execute_source(url, &source).await
            }
            Environment::BrowserStandalone | Environment::BrowserControlBus => {
                self.host.inject_remote(url).await
            }
        }
    }
}
