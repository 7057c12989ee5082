//! # regatta-core
//!
//! Core library for the Regatta registry client providing:
//! - Repository reference and digest value types
//! - OCI descriptor and manifest payload types
//! - The registry error taxonomy shared across the workspace
//! - Retry-safety classification for failover decisions

pub mod classify;
pub mod error;
pub mod reference;
pub mod types;

pub use classify::is_request_error;
pub use error::{Error, ErrorCode, Result};
pub use reference::RepositoryRef;
pub use types::{Descriptor, Digest, Manifest, ManifestOptions};
