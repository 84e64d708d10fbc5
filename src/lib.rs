//! rexx-loader - On-demand library resolution and loading
//!
//! This crate is the library loading subsystem of a Rexx-family scripting
//! runtime: given a textual library reference it locates, fetches (if
//! remote), verifies, and activates external code, loading declared
//! dependencies first so the requesting code never observes a partially
//! initialized library.
//!
//! ## Architecture
//!
//! - **Reference grammar**: local paths, bare names, `registry:` literals,
//!   `namespace/module[@version]`, raw URLs, and comma-separated preference
//!   lists (`reference`).
//! - **Strategy dispatch**: classification routes each reference to the
//!   right loader for the detected execution environment (`loader::resolver`).
//! - **Two-tier registry**: publisher document -> namespace module document
//!   -> concrete URL (`registry::resolver`).
//! - **Remote fetch + persistent cache**: CDN-mirrored packages cached
//!   immutably by `(name, version)` on disk (`registry`).
//! - **Metadata recovery**: dependency lists and detection functions read
//!   from live runtime state or minification-resistant preserved comments
//!   (`metadata`).
//! - **Orchestration**: single-flight per canonical name, depth-first
//!   dependency loading, preference-list fallback (`loader::orchestrator`).
//!
//! The embedding runtime supplies environment detection, the builtin
//! allow-list, and raw code execution through the [`RuntimeHost`] trait, and
//! owns the [`CapabilityRegistry`] loaded libraries install their functions
//! into.

pub mod adapter;
pub mod capability;
pub mod config;
pub mod error;
pub mod host;
pub mod loader;
pub mod metadata;
pub mod reference;
pub mod registry;

pub use adapter::ModuleAdapter;
pub use capability::CapabilityRegistry;
pub use config::LoaderConfig;
pub use error::LoaderError;
pub use host::{Environment, Export, LibraryFunction, LoadedModule, RuntimeHost};
pub use loader::{DependencyGraph, LibraryLoader, LoadState, SourceResolver};
pub use metadata::{LibraryMetadata, MetadataExtractor};
pub use reference::{canonical_name, classify, split_candidates, LibraryReference};
pub use registry::{
    CacheEntry, HttpResponse, HttpTransport, PackageCache, PackageFetcher, RegistryResolver,
    ReqwestTransport,
};
