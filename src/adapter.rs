//! Module adaptation
//!
//! Normalizes an arbitrary loaded module into the runtime's uniform
//! capability surface. Modules that already expose their detection function
//! are natively compatible and have their functions copied through verbatim;
//! anything else gets a synthesized wrapper namespace with upper-snake-cased
//! symbol names.

use std::collections::HashMap;

use tracing::debug;

use crate::capability::CapabilityRegistry;
use crate::host::{Export, LoadedModule};

/// Installs a loaded module's exports into the capability registry.
pub struct ModuleAdapter;

impl ModuleAdapter {
    /// Register a library's capabilities under its canonical name (and an
    /// optional alias). `detection` is the detection-function name recovered
    /// from metadata, if any.
    pub fn register(
        capabilities: &CapabilityRegistry,
        library: &str,
        alias: Option<&str>,
        module: &LoadedModule,
        detection: Option<&str>,
    ) {
        let natively_compatible = detection.is_some_and(|name| module.has_function(name));

        let namespace = if natively_compatible {
            debug!("Library '{}' is natively compatible", library);
            for (name, export) in &module.exports {
                if let Export::Function(function) = export {
                    capabilities.register_function(name, function.clone());
                }
            }
            if let Some(name) = detection {
                if let Some(function) = module.function(name) {
                    capabilities.register_detection(name, function.clone());
                }
            }
            module.exports.clone()
        } else {
            debug!("Synthesizing wrapper namespace for library '{}'", library);
            let mut wrapped = HashMap::new();
            for (name, export) in &module.exports {
                wrapped.insert(upper_snake_case(name), export.clone());
            }
            wrapped
        };

        if let Some(alias) = alias {
            capabilities.register_namespace(alias, namespace.clone());
        }
        capabilities.register_namespace(library, namespace);
    }
}

/// Rewrite `camelCase` to `CAMEL_CASE`: insert `_` before every internal
/// uppercase letter, then uppercase the whole result.
pub fn upper_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}
