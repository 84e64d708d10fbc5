//! Registry resolution and remote package retrieval
//!
//! Handles the two-tier text registry (publisher document -> namespace
//! module document -> concrete URL), the HTTP transport seam with manual
//! redirect following, and the persistent on-disk package cache.

pub mod cache;
pub mod fetch;
pub mod resolver;

pub use cache::{CacheEntry, PackageCache, CACHE_DIR_NAME, PROJECT_DESCRIPTOR};
pub use fetch::{HttpResponse, HttpTransport, PackageFetcher, ReqwestTransport};
pub use resolver::RegistryResolver;
