//! Two-tier registry resolution
//!
//! `namespace/module[@version]` references resolve without a central package
//! host: the publisher registry (a well-known CSV document) maps a namespace
//! to its module registry URL, and the module registry (a line-oriented
//! document) maps a module name to a URL template. Every step fails loudly
//! and names the unresolved namespace, module, or URL.

use std::sync::Arc;

use tracing::debug;

use crate::error::LoaderError;
use crate::registry::fetch::{fetch_text, HttpTransport};

/// Module names with this suffix resolve with `{type}` = `addresses`;
/// everything else gets `functions`.
const ADDRESS_SUFFIX: &str = "-address";

/// Resolves `namespace/module[@version]` to a concrete URL.
pub struct RegistryResolver {
    transport: Arc<dyn HttpTransport>,
    publisher_url: String,
    max_redirects: usize,
}

impl RegistryResolver {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        publisher_url: String,
        max_redirects: usize,
    ) -> Self {
        Self {
            transport,
            publisher_url,
            max_redirects,
        }
    }

    /// Resolve a module reference to the concrete URL its code is served
    /// from. `version` defaults to `latest` when absent.
    pub async fn resolve(
        &self,
        namespace: &str,
        module: &str,
        version: Option<&str>,
    ) -> Result<String, LoaderError> {
        let registry_url = self.lookup_namespace(namespace).await?;
        debug!(
            "Namespace '{}' registry document at {}",
            namespace, registry_url
        );
        let template = self.lookup_module(&registry_url, namespace, module).await?;
        Ok(Self::substitute(&template, module, version))
    }

    /// Tier one: scan the publisher registry for the namespace row.
    async fn lookup_namespace(&self, namespace: &str) -> Result<String, LoaderError> {
        let document = fetch_text(
            self.transport.as_ref(),
            &self.publisher_url,
            self.max_redirects,
        )
        .await?;

        let mut lines = document.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().ok_or_else(|| {
            LoaderError::Resolution(format!(
                "publisher registry {} is empty",
                self.publisher_url
            ))
        })?;

        let columns: Vec<String> = header
            .split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .collect();
        let namespace_col = columns
            .iter()
            .position(|c| c == "namespace")
            .ok_or_else(|| {
                LoaderError::Resolution(format!(
                    "publisher registry {} header has no 'namespace' column",
                    self.publisher_url
                ))
            })?;
        let url_col = columns
            .iter()
            .position(|c| c == "registry_url")
            .ok_or_else(|| {
                LoaderError::Resolution(format!(
                    "publisher registry {} header has no 'registry_url' column",
                    self.publisher_url
                ))
            })?;

        for line in lines {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.get(namespace_col) == Some(&namespace) {
                return fields
                    .get(url_col)
                    .filter(|url| !url.is_empty())
                    .map(|url| url.to_string())
                    .ok_or_else(|| {
                        LoaderError::Resolution(format!(
                            "publisher registry row for namespace '{namespace}' has no registry_url"
                        ))
                    });
            }
        }

        Err(LoaderError::NotFound(format!(
            "namespace '{}' not found in publisher registry {}",
            namespace, self.publisher_url
        )))
    }

    /// Tier two: scan the namespace's module registry for the module row and
    /// return its URL template.
    async fn lookup_module(
        &self,
        registry_url: &str,
        namespace: &str,
        module: &str,
    ) -> Result<String, LoaderError> {
        let document = fetch_text(self.transport.as_ref(), registry_url, self.max_redirects).await?;

        for line in document.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.splitn(3, ',').map(str::trim);
            let (Some(name), Some(_type), Some(template)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if name == module {
                return Ok(template.to_string());
            }
        }

        Err(LoaderError::NotFound(format!(
            "module '{module}' not found in namespace '{namespace}' registry {registry_url}"
        )))
    }

    /// Fill the `{tag}`, `{type}`, and `{name}` placeholders.
    fn substitute(template: &str, module: &str, version: Option<&str>) -> String {
        let tag = version.unwrap_or("latest");
        let kind = if module.ends_with(ADDRESS_SUFFIX) {
            "addresses"
        } else {
            "functions"
        };
        template
            .replace("{tag}", tag)
            .replace("{type}", kind)
            .replace("{name}", module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_placeholders() {
        assert_eq!(
            RegistryResolver::substitute("https://cdn.x/{type}/{name}@{tag}.js", "foo-address", None),
            "https://cdn.x/addresses/foo-address@latest.js"
        );
        assert_eq!(
            RegistryResolver::substitute("https://cdn.x/{type}/{name}@{tag}.js", "bar", Some("2.1")),
            "https://cdn.x/functions/bar@2.1.js"
        );
    }
}
