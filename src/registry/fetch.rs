//! Remote retrieval
//!
//! HTTP access goes through the [`HttpTransport`] seam so tests can count
//! and script responses. Redirects are followed manually (the mirror does
//! not guarantee a single hop); any final non-200 status is fatal. Fetched
//! packages land in the persistent cache before they are returned, and a
//! cache hit never touches the network.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LoaderError;
use crate::registry::cache::PackageCache;

/// A single HTTP exchange. `location` carries the redirect target, if any.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub location: Option<String>,
}

/// Transport seam for HTTP GET. The real implementation does not follow
/// redirects itself; the loader follows them explicitly.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, LoaderError>;
}

/// reqwest-backed transport with redirect following disabled.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, LoaderError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| LoaderError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, LoaderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoaderError::Network(format!("GET {url} failed: {e}")))?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| LoaderError::Network(format!("Failed to read body of {url}: {e}")))?
            .to_vec();
        Ok(HttpResponse {
            status,
            body,
            location,
        })
    }
}

/// GET a URL, following redirects up to `max_hops`, and return the final
/// 200 body. Any other final status is fatal.
pub async fn fetch_following_redirects(
    transport: &dyn HttpTransport,
    url: &str,
    max_hops: usize,
) -> Result<Vec<u8>, LoaderError> {
    let mut current = url.to_string();
    for _ in 0..=max_hops {
        let response = transport.get(&current).await?;
        match response.status {
            200 => return Ok(response.body),
            301 | 302 | 303 | 307 | 308 => {
                let location = response.location.ok_or_else(|| {
                    LoaderError::Network(format!(
                        "GET {current} redirected without a Location header"
                    ))
                })?;
                let next = join_location(&current, &location);
                debug!("Following redirect {} -> {}", current, next);
                current = next;
            }
            status => {
                return Err(LoaderError::Network(format!(
                    "GET {current} returned status {status}"
                )))
            }
        }
    }
    Err(LoaderError::Network(format!(
        "GET {url} exceeded {max_hops} redirects"
    )))
}

/// Like [`fetch_following_redirects`], decoding the body as UTF-8 text.
pub async fn fetch_text(
    transport: &dyn HttpTransport,
    url: &str,
    max_hops: usize,
) -> Result<String, LoaderError> {
    let body = fetch_following_redirects(transport, url, max_hops).await?;
    String::from_utf8(body)
        .map_err(|e| LoaderError::Network(format!("Response from {url} is not UTF-8: {e}")))
}

/// Resolve a Location header against the URL that produced it.
fn join_location(base: &str, location: &str) -> String {
    if location.contains("://") {
        return location.to_string();
    }
    let scheme_end = match base.find("://") {
        Some(i) => i + 3,
        None => return location.to_string(),
    };
    if let Some(rest) = location.strip_prefix('/') {
        let host_end = base[scheme_end..]
            .find('/')
            .map(|i| scheme_end + i)
            .unwrap_or(base.len());
        return format!("{}/{rest}", &base[..host_end]);
    }
    match base.rfind('/') {
        Some(i) if i >= scheme_end => format!("{}/{location}", &base[..i]),
        _ => format!("{base}/{location}"),
    }
}

/// Fetches CDN-mirrored packages, backed by the persistent cache.
pub struct PackageFetcher {
    transport: Arc<dyn HttpTransport>,
    cache: PackageCache,
    mirror_base: String,
    max_redirects: usize,
}

impl PackageFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: PackageCache,
        mirror_base: String,
        max_redirects: usize,
    ) -> Self {
        Self {
            transport,
            cache,
            mirror_base,
            max_redirects,
        }
    }

    pub fn cache(&self) -> &PackageCache {
        &self.cache
    }

    /// Resolve `(name, version)` to package source. Cache hits short-circuit
    /// the network entirely; misses fetch `<mirror>/<name>@<version>` and
    /// persist the body before returning it.
    pub async fn resolve(&self, name: &str, version: &str) -> Result<String, LoaderError> {
        if let Some(cached) = self.cache.load(name, version).await? {
            return Ok(cached);
        }

        let url = format!(
            "{}/{name}@{version}",
            self.mirror_base.trim_end_matches('/')
        );
        debug!("Fetching package {}@{} from {}", name, version, url);
        let body = fetch_text(self.transport.as_ref(), &url, self.max_redirects).await?;
        self.cache.store(name, version, &body).await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_redirect_locations() {
        assert_eq!(
            join_location("https://a.example/x/y", "https://b.example/z"),
            "https://b.example/z"
        );
        assert_eq!(
            join_location("https://a.example/x/y", "/z"),
            "https://a.example/z"
        );
        assert_eq!(
            join_location("https://a.example/x/y", "z"),
            "https://a.example/x/z"
        );
    }
}
