//! Failover-capable registry repository client for Regatta
//!
//! This crate wraps a registry transport (consumed through the capability
//! traits in [`repository`]) with alternate-source resolution: when the
//! primary registry holding a content-addressed object is unreachable or
//! fails, the same logical request is transparently retried against a
//! ranked list of alternate repositories, without corrupting partial writes
//! or issuing mutations against the wrong target.
//!
//! # Example
//!
//! ```no_run
//! use regatta_client::{MirroredRepository, StaticMirrorStrategy};
//! use regatta_core::{ManifestOptions, RepositoryRef};
//! use std::sync::Arc;
//!
//! # async fn example(connector: Arc<dyn regatta_client::RegistryConnector>) -> anyhow::Result<()> {
//! let primary = RepositoryRef::parse("ghcr.io/acme/web")?;
//! let mirror = RepositoryRef::parse("mirror.internal/acme/web")?;
//!
//! let repo = MirroredRepository::new(connector, primary, false)
//!     .with_strategy(Arc::new(StaticMirrorStrategy::reactive(vec![mirror])));
//!
//! let manifests = repo.manifests(ManifestOptions::default());
//! let digest = regatta_core::Digest::parse("sha256:abc123")?;
//! let (manifest, served_by) = manifests.get_with_location(&digest).await?;
//! println!("{} served by {}", manifest.digest, served_by);
//! # Ok(())
//! # }
//! ```

pub mod facade;
pub mod mirrored;
pub mod repository;
pub mod strategy;

pub use facade::{MirroredBlobs, MirroredManifests, MirroredTags};
pub use mirrored::{MirroredRepository, RouteMode};
pub use repository::{
    BlobStore, BlobWriter, ManifestStore, RegistryConnector, Repository, TagStore,
};
pub use strategy::{AlternateSourceStrategy, StaticMirrorStrategy};
