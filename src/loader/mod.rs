//! Load orchestration
//!
//! The orchestrator sequences dependency-first loading, deduplicates
//! in-flight work per canonical name, and walks preference lists; the source
//! resolver underneath classifies each reference and routes it to the right
//! loading strategy for the current execution environment.

pub mod orchestrator;
pub mod resolver;

pub use orchestrator::{DependencyGraph, LibraryLoader, LoadState};
pub use resolver::SourceResolver;
