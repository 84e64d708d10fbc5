//! Loader error taxonomy
//!
//! All loader failures funnel into [`LoaderError`]. Variants mirror the
//! stages of a load: classification, lookup, transfer, metadata recovery,
//! and execution of the library source itself.

use thiserror::Error;

/// Library loading errors
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The reference string could not be classified or parsed.
    #[error("Unresolvable reference: {0}")]
    Resolution(String),

    /// A local file, registry namespace, or registry module row is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection failure, or a final non-200 status after redirects.
    #[error("Network error: {0}")]
    Network(String),

    /// Dependency metadata or the detection function could not be recovered
    /// after the library source executed.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// The library source threw while executing.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Reading or writing the persistent package cache failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A dependency edge re-entered the current load chain.
    #[error("Circular dependency: {0}")]
    CircularDependency(String),

    /// Failure observed by a requester that awaited another requester's
    /// in-flight load of the same library.
    #[error("{0}")]
    LoadFailed(String),

    /// Every candidate in a preference list failed; carries the full
    /// candidate list and wraps the last candidate's error.
    #[error("All candidates failed [{candidates}]: {last}")]
    AllCandidatesFailed {
        candidates: String,
        #[source]
        last: Box<LoaderError>,
    },
}

impl LoaderError {
    /// Tag an error with the reference string that triggered the load.
    pub fn with_reference(self, reference: &str) -> Self {
        match self {
            LoaderError::Resolution(m) => LoaderError::Resolution(format!("{reference}: {m}")),
            LoaderError::NotFound(m) => LoaderError::NotFound(format!("{reference}: {m}")),
            LoaderError::Network(m) => LoaderError::Network(format!("{reference}: {m}")),
            LoaderError::Metadata(m) => LoaderError::Metadata(format!("{reference}: {m}")),
            LoaderError::Execution(m) => LoaderError::Execution(format!("{reference}: {m}")),
            LoaderError::Cache(m) => LoaderError::Cache(format!("{reference}: {m}")),
            other => other,
        }
    }
}

impl From<std::io::Error> for LoaderError {
    fn from(e: std::io::Error) -> Self {
        LoaderError::Cache(e.to_string())
    }
}

impl From<serde_json::Error> for LoaderError {
    fn from(e: serde_json::Error) -> Self {
        LoaderError::Metadata(e.to_string())
    }
}
