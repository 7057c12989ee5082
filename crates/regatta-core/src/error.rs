//! Error taxonomy for the Regatta registry client
//!
//! The variants here mirror the failure classes the failover orchestrator
//! routes on: strategy failures are fatal, connection failures skip to the
//! next candidate, request-level rejections are retryable elsewhere, and
//! transfer failures abort streaming operations. See [`crate::classify`]
//! for the retry-safety predicate built on this taxonomy.

use crate::reference::RepositoryRef;
use std::fmt;
use thiserror::Error;

/// Boxed source error from a collaborator (transport, auth, strategy)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias using regatta-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error codes defined by the distribution spec
///
/// Only the codes the client routes on are enumerated; anything else is
/// carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    ManifestUnknown,
    BlobUnknown,
    NameUnknown,
    Unauthorized,
    Denied,
    TooManyRequests,
    Unsupported,
    Other(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::ManifestUnknown => "MANIFEST_UNKNOWN",
            ErrorCode::BlobUnknown => "BLOB_UNKNOWN",
            ErrorCode::NameUnknown => "NAME_UNKNOWN",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Denied => "DENIED",
            ErrorCode::TooManyRequests => "TOOMANYREQUESTS",
            ErrorCode::Unsupported => "UNSUPPORTED",
            ErrorCode::Other(code) => code,
        };
        f.write_str(code)
    }
}

/// Error types for registry operations
#[derive(Error, Debug)]
pub enum Error {
    /// The alternate-source policy itself failed; no candidates are attempted
    #[error("alternate source strategy failed for {reference}: {source}")]
    Strategy {
        reference: RepositoryRef,
        source: BoxError,
    },

    /// A candidate registry could not be reached or authenticated
    #[error("failed to connect to {reference}: {source}")]
    Connect {
        reference: RepositoryRef,
        source: BoxError,
    },

    /// The registry responded with a structured error-code payload
    #[error("registry rejected request ({code}): {message}")]
    Registry { code: ErrorCode, message: String },

    /// The registry responded with an unexpected status or response shape
    #[error("unexpected response status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// No usable credentials for the registry
    #[error("no usable credentials for {registry}")]
    Credentials { registry: String },

    /// I/O failure after the transfer began; bytes may have reached the sink
    #[error("transfer failed mid-stream: {0}")]
    Transfer(#[from] std::io::Error),

    /// The operation was canceled by the caller
    #[error("operation canceled")]
    Canceled,

    /// The candidate list resolved to an explicit empty set
    #[error("no valid sources for {reference}: the alternate source strategy rejected every candidate")]
    NoValidSources { reference: RepositoryRef },

    /// A repository reference string could not be parsed
    #[error("invalid reference {value:?}: {message}")]
    InvalidReference { value: String, message: String },

    /// A digest string could not be parsed
    #[error("invalid digest {value:?}: {message}")]
    InvalidDigest { value: String, message: String },

    /// A collaborator-defined failure outside the taxonomy above
    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Create a strategy error
    pub fn strategy(reference: RepositoryRef, source: impl Into<BoxError>) -> Self {
        Self::Strategy {
            reference,
            source: source.into(),
        }
    }

    /// Create a connection error
    pub fn connect(reference: RepositoryRef, source: impl Into<BoxError>) -> Self {
        Self::Connect {
            reference,
            source: source.into(),
        }
    }

    /// Create a structured registry rejection
    pub fn registry(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Registry {
            code,
            message: message.into(),
        }
    }

    /// Create an unexpected-status error
    pub fn unexpected_status(status: u16, url: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            status,
            url: url.into(),
        }
    }

    /// Create a missing-credentials error
    pub fn credentials(registry: impl Into<String>) -> Self {
        Self::Credentials {
            registry: registry.into(),
        }
    }

    /// Create a no-valid-sources error
    pub fn no_valid_sources(reference: RepositoryRef) -> Self {
        Self::NoValidSources { reference }
    }

    /// Create an invalid-reference error
    pub fn invalid_reference(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidReference {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-digest error
    pub fn invalid_digest(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDigest {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an error from a collaborator-defined source
    pub fn other(source: impl Into<BoxError>) -> Self {
        Self::Other(source.into())
    }
}
