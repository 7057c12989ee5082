//! Content-addressed value types crossing the repository capability surface

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content address of a blob or manifest (e.g., "sha256:abc123...")
///
/// A digest names immutable content, which is what makes mirrored reads
/// safe: any source returning matching content is equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Parse a digest string of the form `<algorithm>:<hex>`
    ///
    /// Validation is syntactic only; verifying that content actually hashes
    /// to the digest is the transport's concern.
    pub fn parse(s: &str) -> Result<Self> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| Error::invalid_digest(s, "expected <algorithm>:<hex>"))?;

        if algorithm.is_empty()
            || !algorithm
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(Error::invalid_digest(s, "invalid algorithm"));
        }
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_digest(s, "invalid hex payload"));
        }

        Ok(Self(s.to_string()))
    }

    /// The algorithm component (e.g., "sha256")
    pub fn algorithm(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// The hex component
    pub fn hex(&self) -> &str {
        self.0.split_once(':').map(|(_, hex)| hex).unwrap_or_default()
    }

    /// The full digest string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pointer to a piece of content stored in a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: Digest,
    pub size: u64,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, digest: Digest, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest,
            size,
        }
    }
}

/// A fully-buffered manifest body
///
/// Bodies are opaque here; parsing the manifest media type is the caller's
/// concern. Reads always buffer completely before the manifest is handed
/// back, so a failed read never leaks partial content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub media_type: String,
    pub digest: Digest,
    pub payload: Bytes,
}

impl Manifest {
    pub fn new(media_type: impl Into<String>, digest: Digest, payload: Bytes) -> Self {
        Self {
            media_type: media_type.into(),
            digest,
            payload,
        }
    }

    /// Descriptor for this manifest
    pub fn descriptor(&self) -> Descriptor {
        Descriptor::new(
            self.media_type.clone(),
            self.digest.clone(),
            self.payload.len() as u64,
        )
    }
}

/// Construction options for a manifest service
///
/// The accept list is per-repository state: a service built with one set of
/// options must be reused for every call against that repository rather than
/// rebuilt per request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManifestOptions {
    /// Media types the caller is willing to accept, in preference order
    pub accept: Vec<String>,
}

impl ManifestOptions {
    pub fn accepting<I, S>(accept: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accept: accept.into_iter().map(Into::into).collect(),
        }
    }
}
