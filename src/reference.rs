//! Library reference grammar
//!
//! A reference is a single string naming a library by one of several
//! addressing schemes: local path, bare name, `registry:`-prefixed name,
//! `namespace/module[@version]`, absolute URL, or a comma-separated
//! preference list of any of the above. Classification is purely syntactic;
//! strategy selection on top of it lives in the source resolver.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::LoaderError;

/// Parsed classification of a single (non-list) library reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryReference {
    /// `./x`, `../x`, absolute, or drive-letter path.
    LocalPath(String),
    /// Plain name with no scheme, possibly carrying an `@version` suffix.
    BareName(String),
    /// `registry:namespace/library[@version]`.
    Registry {
        namespace: String,
        library: String,
        version: Option<String>,
    },
    /// `namespace/module[@version]`.
    NamespaceModule {
        namespace: String,
        module: String,
        version: Option<String>,
    },
    /// Absolute URL with an explicit scheme.
    Url(String),
}

fn drive_letter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]:[/\\]").expect("drive letter regex"))
}

fn namespace_module_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9][A-Za-z0-9_.-]*)/([A-Za-z0-9][A-Za-z0-9_.-]*)(?:@([^/@]+))?$")
            .expect("namespace/module regex")
    })
}

/// Split a reference into its ordered preference-list candidates.
///
/// A reference without commas yields a single candidate. Empty segments are
/// dropped.
pub fn split_candidates(reference: &str) -> Vec<String> {
    reference
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Classify a single candidate reference.
pub fn classify(reference: &str) -> Result<LibraryReference, LoaderError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(LoaderError::Resolution("empty library reference".to_string()));
    }

    if let Some(rest) = reference.strip_prefix("registry:") {
        let (namespace, library, version) = parse_namespace_module(rest).ok_or_else(|| {
            LoaderError::Resolution(format!(
                "registry reference '{reference}' is not of the form registry:namespace/library[@version]"
            ))
        })?;
        return Ok(LibraryReference::Registry {
            namespace,
            library,
            version,
        });
    }

    if reference.contains("://") {
        return Ok(LibraryReference::Url(reference.to_string()));
    }

    if reference.starts_with("./")
        || reference.starts_with("../")
        || reference.starts_with('/')
        || reference.starts_with(".\\")
        || reference.starts_with("..\\")
        || drive_letter_re().is_match(reference)
    {
        return Ok(LibraryReference::LocalPath(reference.to_string()));
    }

    if let Some(caps) = namespace_module_re().captures(reference) {
        return Ok(LibraryReference::NamespaceModule {
            namespace: caps[1].to_string(),
            module: caps[2].to_string(),
            version: caps.get(3).map(|m| m.as_str().to_string()),
        });
    }

    Ok(LibraryReference::BareName(reference.to_string()))
}

/// Derive the canonical name used for load-state and dependency-graph
/// bookkeeping: scheme prefixes stripped, version tag stripped.
pub fn canonical_name(reference: &str) -> String {
    match classify(reference) {
        Ok(LibraryReference::Registry {
            namespace, library, ..
        }) => format!("{namespace}/{library}"),
        Ok(LibraryReference::NamespaceModule {
            namespace, module, ..
        }) => format!("{namespace}/{module}"),
        Ok(LibraryReference::Url(url)) => match url.find("://") {
            Some(i) => url[i + 3..].to_string(),
            None => url,
        },
        Ok(LibraryReference::BareName(name)) => split_version(&name).0.to_string(),
        Ok(LibraryReference::LocalPath(path)) => path,
        Err(_) => reference.trim().to_string(),
    }
}

/// Split a trailing `@version` tag off a bare name. A leading `@` (npm-style
/// scope marker) is not a version separator.
pub fn split_version(name: &str) -> (&str, Option<&str>) {
    if name.len() < 2 {
        return (name, None);
    }
    match name[1..].find('@') {
        Some(i) => (&name[..i + 1], Some(&name[i + 2..])),
        None => (name, None),
    }
}

fn parse_namespace_module(text: &str) -> Option<(String, String, Option<String>)> {
    let caps = namespace_module_re().captures(text.trim())?;
    Some((
        caps[1].to_string(),
        caps[2].to_string(),
        caps.get(3).map(|m| m.as_str().to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_local_paths() {
        assert_eq!(
            classify("./lib/helpers.rexx").unwrap(),
            LibraryReference::LocalPath("./lib/helpers.rexx".to_string())
        );
        assert_eq!(
            classify("../shared.rexx").unwrap(),
            LibraryReference::LocalPath("../shared.rexx".to_string())
        );
        assert_eq!(
            classify("/opt/libs/math.rexx").unwrap(),
            LibraryReference::LocalPath("/opt/libs/math.rexx".to_string())
        );
        assert_eq!(
            classify(r"C:\libs\math.rexx").unwrap(),
            LibraryReference::LocalPath(r"C:\libs\math.rexx".to_string())
        );
    }

    #[test]
    fn classifies_registry_prefix() {
        assert_eq!(
            classify("registry:acme/graph-tools@2.1").unwrap(),
            LibraryReference::Registry {
                namespace: "acme".to_string(),
                library: "graph-tools".to_string(),
                version: Some("2.1".to_string()),
            }
        );
        assert!(classify("registry:no-slash-here").is_err());
    }

    #[test]
    fn classifies_namespace_module() {
        assert_eq!(
            classify("acme/foo-address").unwrap(),
            LibraryReference::NamespaceModule {
                namespace: "acme".to_string(),
                module: "foo-address".to_string(),
                version: None,
            }
        );
        assert_eq!(
            classify("acme/foo@1.2.3").unwrap(),
            LibraryReference::NamespaceModule {
                namespace: "acme".to_string(),
                module: "foo".to_string(),
                version: Some("1.2.3".to_string()),
            }
        );
    }

    #[test]
    fn scoped_package_is_a_bare_name_not_a_namespace_module() {
        // `@scope/name` is syntactically close to namespace/module; it must
        // stay a bare name so the resolver can route it to host resolution.
        assert_eq!(
            classify("@scope/pkg").unwrap(),
            LibraryReference::BareName("@scope/pkg".to_string())
        );
    }

    #[test]
    fn classifies_urls_and_bare_names() {
        assert_eq!(
            classify("https://cdn.example/lib.js").unwrap(),
            LibraryReference::Url("https://cdn.example/lib.js".to_string())
        );
        assert_eq!(
            classify("string-functions").unwrap(),
            LibraryReference::BareName("string-functions".to_string())
        );
    }

    #[test]
    fn splits_preference_lists() {
        assert_eq!(
            split_candidates("missing-lib, ./fixture/local.lib"),
            vec!["missing-lib".to_string(), "./fixture/local.lib".to_string()]
        );
        assert_eq!(split_candidates("one"), vec!["one".to_string()]);
        assert!(split_candidates(" , ,").is_empty());
    }

    #[test]
    fn canonical_names_strip_schemes_and_versions() {
        assert_eq!(canonical_name("registry:acme/lib@2.0"), "acme/lib");
        assert_eq!(canonical_name("acme/lib@2.0"), "acme/lib");
        assert_eq!(canonical_name("pkg@1.2.3"), "pkg");
        assert_eq!(canonical_name("@scope/pkg@1.0"), "@scope/pkg");
        assert_eq!(
            canonical_name("https://cdn.example/lib.js"),
            "cdn.example/lib.js"
        );
        assert_eq!(canonical_name("./local.rexx"), "./local.rexx");
    }

    #[test]
    fn split_version_ignores_leading_at() {
        assert_eq!(split_version("pkg@1.2.3"), ("pkg", Some("1.2.3")));
        assert_eq!(split_version("pkg"), ("pkg", None));
        assert_eq!(split_version("@scope/pkg"), ("@scope/pkg", None));
        assert_eq!(split_version("@scope/pkg@2"), ("@scope/pkg", Some("2")));
    }
}
