//! Repository references

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a repository hosted on a registry
///
/// A reference names a registry endpoint plus a repository path on it, e.g.
/// `ghcr.io` + `acme/web`. Two references are the same source iff they
/// compare equal; references are used as cache keys throughout the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Registry hostname, optionally with a port (e.g., "ghcr.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g., "acme/web")
    pub repository: String,
}

impl RepositoryRef {
    /// Create a reference from already-validated parts
    pub fn new(registry: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
        }
    }

    /// Parse a reference string like "ghcr.io/acme/web"
    ///
    /// The first path segment is the registry host; everything after the
    /// first `/` is the repository path. A `:` in the host segment is a
    /// port (e.g., "localhost:5000/test/image").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_reference(s, "reference is empty"));
        }

        let (registry, repository) = match s.split_once('/') {
            Some((registry, repository)) => (registry, repository),
            None => {
                return Err(Error::invalid_reference(
                    s,
                    "expected <registry>/<repository>",
                ))
            }
        };

        if registry.is_empty() {
            return Err(Error::invalid_reference(s, "registry host is empty"));
        }
        if repository.is_empty() || repository.split('/').any(|seg| seg.is_empty()) {
            return Err(Error::invalid_reference(s, "repository path is empty"));
        }
        // Tags and digests identify content within a repository, not the
        // repository itself; reject them here rather than silently dropping.
        if repository.contains('@') || repository.rsplit('/').next().is_some_and(|l| l.contains(':'))
        {
            return Err(Error::invalid_reference(
                s,
                "reference must not carry a tag or digest",
            ));
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
        })
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)
    }
}
