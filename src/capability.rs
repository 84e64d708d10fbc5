//! Capability registry
//!
//! The shared symbol table loaded libraries install their functions into,
//! plus per-library namespaces and the process-wide detection-function
//! registry. One instance is owned by the embedding runtime and passed into
//! the loader by `Arc`; nothing here is process-global, so two runtime
//! instances never interfere.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::host::{Export, LibraryFunction};

/// Registry of callable capabilities installed by loaded libraries.
///
/// Later registrations under the same symbol name overwrite earlier ones
/// (last-load-wins); the overwrite is logged, never an error.
#[derive(Default)]
pub struct CapabilityRegistry {
    functions: RwLock<HashMap<String, LibraryFunction>>,
    namespaces: RwLock<HashMap<String, HashMap<String, Export>>>,
    detection: RwLock<HashMap<String, LibraryFunction>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a function into the shared capability namespace.
    pub fn register_function(&self, name: &str, function: LibraryFunction) {
        let mut functions = self.functions.write().expect("capability table poisoned");
        if functions.insert(name.to_string(), function).is_some() {
            debug!("Capability '{}' overwritten (last-load-wins)", name);
        }
    }

    /// Look up a function in the shared capability namespace.
    pub fn function(&self, name: &str) -> Option<LibraryFunction> {
        self.functions
            .read()
            .expect("capability table poisoned")
            .get(name)
            .cloned()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions
            .read()
            .expect("capability table poisoned")
            .contains_key(name)
    }

    /// Install a library's whole export set under a namespace key.
    pub fn register_namespace(&self, library: &str, exports: HashMap<String, Export>) {
        let mut namespaces = self.namespaces.write().expect("namespace table poisoned");
        if namespaces.insert(library.to_string(), exports).is_some() {
            debug!("Namespace '{}' overwritten (last-load-wins)", library);
        }
    }

    /// Exports registered under a library's namespace key, if any.
    pub fn namespace(&self, library: &str) -> Option<HashMap<String, Export>> {
        self.namespaces
            .read()
            .expect("namespace table poisoned")
            .get(library)
            .cloned()
    }

    /// Register a detection function under its well-known name. Populated
    /// at load time; consulted by metadata extraction.
    pub fn register_detection(&self, name: &str, function: LibraryFunction) {
        self.detection
            .write()
            .expect("detection table poisoned")
            .insert(name.to_string(), function);
    }

    /// Look up a detection function by name.
    pub fn detection(&self, name: &str) -> Option<LibraryFunction> {
        self.detection
            .read()
            .expect("detection table poisoned")
            .get(name)
            .cloned()
    }
}
