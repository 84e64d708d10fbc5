//! Dependency and detection-function metadata recovery
//!
//! After a library's source has executed, its declared dependencies and
//! detection function are recovered by trying, in order: live runtime state
//! (the detection-function registry or a deterministic name lookup),
//! preserved `/*! ... */` source comments (the form minifiers keep), and
//! legacy free-text comment markers. A library that declares nothing has
//! zero dependencies; that is not an error.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::capability::CapabilityRegistry;
use crate::error::LoaderError;
use crate::host::{LibraryFunction, LoadedModule};

/// Declared metadata of a loaded library. Computed once per canonical name
/// and cached for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct LibraryMetadata {
    /// Well-known exported symbol confirming initialization, if declared.
    pub detection_function: Option<String>,
    /// Declared dependencies: name -> opaque version tag.
    pub dependencies: HashMap<String, Option<String>>,
}

fn preserved_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*!(.*?)\*/").expect("preserved comment regex"))
}

fn meta_function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@rexxjs-meta=([A-Za-z_$][A-Za-z0-9_$]*)").expect("meta function regex")
    })
}

fn legacy_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)/\*\s*@(?:dependencies|require)\s+(.*?)\*/").expect("legacy marker regex")
    })
}

/// Recovers library metadata and caches it per canonical name.
pub struct MetadataExtractor {
    capabilities: Arc<CapabilityRegistry>,
    cache: Mutex<HashMap<String, LibraryMetadata>>,
}

impl MetadataExtractor {
    pub fn new(capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            capabilities,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Determine a library's metadata, consulting the process-lifetime cache
    /// first.
    pub async fn extract(
        &self,
        canonical: &str,
        module: &LoadedModule,
    ) -> Result<LibraryMetadata, LoaderError> {
        if let Some(cached) = self.cache.lock().await.get(canonical) {
            return Ok(cached.clone());
        }
        let metadata = self.compute(canonical, module)?;
        self.cache
            .lock()
            .await
            .insert(canonical.to_string(), metadata.clone());
        Ok(metadata)
    }

    fn compute(
        &self,
        canonical: &str,
        module: &LoadedModule,
    ) -> Result<LibraryMetadata, LoaderError> {
        // 1. Runtime metadata: a globally reachable detection function for
        //    this library, found in the registry or by deterministic name.
        let well_known = deterministic_detection_name(canonical);
        let runtime_fn = self
            .capabilities
            .detection(&well_known)
            .or_else(|| module.function(&well_known).cloned());
        if let Some(function) = runtime_fn {
            debug!(
                "Library '{}' metadata from detection function '{}'",
                canonical, well_known
            );
            let dependencies = invoke_for_dependencies(&function, &well_known)?;
            return Ok(LibraryMetadata {
                detection_function: Some(well_known),
                dependencies,
            });
        }

        let Some(source) = module.source.as_deref() else {
            return Ok(LibraryMetadata::default());
        };

        // 2. Preserved comment, the form minifiers keep.
        if let Some(name) = find_meta_function(source) {
            debug!(
                "Library '{}' declares detection function '{}' in a preserved comment",
                canonical, name
            );
            let dependencies = if let Some(deps) = find_meta_dependencies(source) {
                deps
            } else if let Some(function) = self
                .capabilities
                .detection(&name)
                .or_else(|| module.function(&name).cloned())
            {
                invoke_for_dependencies(&function, &name)?
            } else {
                HashMap::new()
            };
            return Ok(LibraryMetadata {
                detection_function: Some(name),
                dependencies,
            });
        }

        // 3. Legacy free-text markers.
        if let Some(dependencies) = find_legacy_dependencies(source) {
            return Ok(LibraryMetadata {
                detection_function: None,
                dependencies,
            });
        }

        Ok(LibraryMetadata::default())
    }
}

/// Invoke a detection function and read its `dependencies` field.
fn invoke_for_dependencies(
    function: &LibraryFunction,
    name: &str,
) -> Result<HashMap<String, Option<String>>, LoaderError> {
    let value = function(&[]).map_err(|e| {
        LoaderError::Metadata(format!("detection function '{name}' failed: {e}"))
    })?;
    Ok(value
        .get("dependencies")
        .map(parse_dependencies)
        .unwrap_or_default())
}

/// Accept either an array of names or an object keyed by name; object values
/// are carried as opaque version tags.
pub fn parse_dependencies(value: &Value) -> HashMap<String, Option<String>> {
    let mut dependencies = HashMap::new();
    match value {
        Value::Array(items) => {
            for item in items {
                if let Value::String(name) = item {
                    dependencies.insert(name.clone(), None);
                }
            }
        }
        Value::Object(map) => {
            for (name, tag) in map {
                let tag = match tag {
                    Value::String(s) => Some(s.clone()),
                    _ => None,
                };
                dependencies.insert(name.clone(), tag);
            }
        }
        _ => {}
    }
    dependencies
}

/// Find `@rexxjs-meta=FUNCTION_NAME` inside any preserved comment block.
pub fn find_meta_function(source: &str) -> Option<String> {
    for comment in preserved_comment_re().captures_iter(source) {
        if let Some(caps) = meta_function_re().captures(&comment[1]) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Find an inline JSON blob with a `dependencies` object inside a preserved
/// comment block.
pub fn find_meta_dependencies(source: &str) -> Option<HashMap<String, Option<String>>> {
    for comment in preserved_comment_re().captures_iter(source) {
        let body = &comment[1];
        let (start, end) = match (body.find('{'), body.rfind('}')) {
            (Some(s), Some(e)) if e > s => (s, e),
            _ => continue,
        };
        let Ok(blob) = serde_json::from_str::<Value>(&body[start..=end]) else {
            continue;
        };
        if let Some(deps) = blob.get("dependencies") {
            if deps.is_object() || deps.is_array() {
                return Some(parse_dependencies(deps));
            }
        }
    }
    None
}

/// Find a legacy `/* @dependencies ... */` or `/* @require ... */` marker.
/// The body is a whitespace/comma-separated name list.
pub fn find_legacy_dependencies(source: &str) -> Option<HashMap<String, Option<String>>> {
    let caps = legacy_marker_re().captures(source)?;
    let mut dependencies = HashMap::new();
    for name in caps[1].split(|c: char| c.is_whitespace() || c == ',') {
        let name = name.trim();
        if !name.is_empty() {
            dependencies.insert(name.to_string(), None);
        }
    }
    Some(dependencies)
}

/// Deterministic detection-function name for a canonical library name:
/// the last path segment, extension dropped, upper-snake-cased, suffixed
/// with `_MAIN` (e.g. `acme/graph-tools` -> `GRAPH_TOOLS_MAIN`).
pub fn deterministic_detection_name(canonical: &str) -> String {
    let segment = canonical
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(canonical);
    let stem = match segment.rfind('.') {
        Some(i) if i > 0 => &segment[..i],
        _ => segment,
    };
    let mut name = String::with_capacity(stem.len() + 5);
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_uppercase());
        } else {
            name.push('_');
        }
    }
    name.push_str("_MAIN");
    name
}
