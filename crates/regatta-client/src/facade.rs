//! Per-capability facades over the failover orchestrator
//!
//! Each facade method declares its routing mode at the call site and
//! dispatches through the orchestrator's shared executor. The table:
//!
//! | Capability | Operation                  | Routing              |
//! |------------|----------------------------|----------------------|
//! | Manifest   | get, get_with_location, exists | ReadMirrored     |
//! | Manifest   | put, delete                | WriteSourceOnly      |
//! | Blob       | get, stat, open            | ReadMirrored         |
//! | Blob       | serve                      | ReadStreamSingleShot |
//! | Blob       | create, put, resume, delete | WriteSourceOnly     |
//! | Tag        | get, all, lookup, tag, untag | WriteSourceOnly    |
//!
//! Tag reads are source-only even though they do not mutate: a tag is a
//! mutable pointer, so only the primary's answer is authoritative.

use crate::mirrored::{MirrorInner, RouteMode};
use crate::repository::{BlobStore, BlobWriter, ManifestStore, Repository, TagStore};
use async_trait::async_trait;
use bytes::Bytes;
use regatta_core::{Descriptor, Digest, Manifest, ManifestOptions, RepositoryRef, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::trace;

/// Manifest operations with mirrored reads
///
/// Holds one manifest service per candidate repository, built with the
/// accept options this facade was created with. Services carry that state,
/// so they are cached for the life of the facade rather than rebuilt per
/// call; the cache has its own lock, separate from the orchestrator's.
pub struct MirroredManifests {
    inner: Arc<MirrorInner>,
    options: ManifestOptions,
    services: Mutex<HashMap<RepositoryRef, Arc<dyn ManifestStore>>>,
}

impl MirroredManifests {
    pub(crate) fn new(inner: Arc<MirrorInner>, options: ManifestOptions) -> Self {
        Self {
            inner,
            options,
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Manifest service for one connected candidate, created once
    async fn manifest_service(
        &self,
        repository: &Arc<dyn Repository>,
    ) -> Result<Arc<dyn ManifestStore>> {
        let key = repository.named().clone();
        let mut services = self.services.lock().await;
        if let Some(service) = services.get(&key) {
            trace!("reusing manifest service for {}", key);
            return Ok(service.clone());
        }
        let service = repository.manifests(&self.options).await?;
        services.insert(key, service.clone());
        Ok(service)
    }

    /// Fetch a manifest along with the reference that actually served it
    ///
    /// Callers resolving blob references relative to the serving mirror
    /// need this provenance; an error means nothing served the request.
    pub async fn get_with_location(&self, digest: &Digest) -> Result<(Manifest, RepositoryRef)> {
        let this = self;
        this.inner
            .route(RouteMode::ReadMirrored, move |repository| async move {
                let service = this.manifest_service(&repository).await?;
                let manifest = service.get(digest).await?;
                Ok((manifest, repository.named().clone()))
            })
            .await
    }
}

#[async_trait]
impl ManifestStore for MirroredManifests {
    async fn get(&self, digest: &Digest) -> Result<Manifest> {
        let this = self;
        this.inner
            .route(RouteMode::ReadMirrored, move |repository| async move {
                let service = this.manifest_service(&repository).await?;
                service.get(digest).await
            })
            .await
    }

    async fn exists(&self, digest: &Digest) -> Result<bool> {
        let this = self;
        this.inner
            .route(RouteMode::ReadMirrored, move |repository| async move {
                let service = this.manifest_service(&repository).await?;
                service.exists(digest).await
            })
            .await
    }

    async fn put(&self, manifest: Manifest) -> Result<Digest> {
        let this = self;
        let manifest = &manifest;
        this.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let service = this.manifest_service(&repository).await?;
                service.put(manifest.clone()).await
            })
            .await
    }

    async fn delete(&self, digest: &Digest) -> Result<()> {
        let this = self;
        this.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let service = this.manifest_service(&repository).await?;
                service.delete(digest).await
            })
            .await
    }
}

/// Blob operations with mirrored reads and single-shot streaming
pub struct MirroredBlobs {
    inner: Arc<MirrorInner>,
}

impl MirroredBlobs {
    pub(crate) fn new(inner: Arc<MirrorInner>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl BlobStore for MirroredBlobs {
    async fn get(&self, digest: &Digest) -> Result<Bytes> {
        self.inner
            .route(RouteMode::ReadMirrored, move |repository| async move {
                let blobs = repository.blobs();
                blobs.get(digest).await
            })
            .await
    }

    async fn stat(&self, digest: &Digest) -> Result<Descriptor> {
        self.inner
            .route(RouteMode::ReadMirrored, move |repository| async move {
                let blobs = repository.blobs();
                blobs.stat(digest).await
            })
            .await
    }

    async fn open(&self, digest: &Digest) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        self.inner
            .route(RouteMode::ReadMirrored, move |repository| async move {
                let blobs = repository.blobs();
                blobs.open(digest).await
            })
            .await
    }

    async fn serve(
        &self,
        digest: &Digest,
        out: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()> {
        // The sink is handed to at most one candidate at a time; the lock
        // exists so a shared-reference closure can reach the exclusive sink.
        let sink = Mutex::new(out);
        let sink = &sink;
        self.inner
            .route(
                RouteMode::ReadStreamSingleShot,
                move |repository| async move {
                    let mut guard = sink.lock().await;
                    let blobs = repository.blobs();
                    blobs.serve(digest, &mut **guard).await
                },
            )
            .await
    }

    async fn create(&self) -> Result<Box<dyn BlobWriter>> {
        self.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let blobs = repository.blobs();
                blobs.create().await
            })
            .await
    }

    async fn put(&self, media_type: &str, payload: Bytes) -> Result<Descriptor> {
        let payload = &payload;
        self.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let blobs = repository.blobs();
                blobs.put(media_type, payload.clone()).await
            })
            .await
    }

    async fn resume(&self, id: &str) -> Result<Box<dyn BlobWriter>> {
        self.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let blobs = repository.blobs();
                blobs.resume(id).await
            })
            .await
    }

    async fn delete(&self, digest: &Digest) -> Result<()> {
        self.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let blobs = repository.blobs();
                blobs.delete(digest).await
            })
            .await
    }
}

/// Tag operations, always against the primary
pub struct MirroredTags {
    inner: Arc<MirrorInner>,
}

impl MirroredTags {
    pub(crate) fn new(inner: Arc<MirrorInner>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TagStore for MirroredTags {
    async fn get(&self, tag: &str) -> Result<Descriptor> {
        self.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let tags = repository.tags();
                tags.get(tag).await
            })
            .await
    }

    async fn all(&self) -> Result<Vec<String>> {
        self.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let tags = repository.tags();
                tags.all().await
            })
            .await
    }

    async fn lookup(&self, descriptor: &Descriptor) -> Result<Vec<String>> {
        self.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let tags = repository.tags();
                tags.lookup(descriptor).await
            })
            .await
    }

    async fn tag(&self, tag: &str, descriptor: &Descriptor) -> Result<()> {
        self.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let tags = repository.tags();
                tags.tag(tag, descriptor).await
            })
            .await
    }

    async fn untag(&self, tag: &str) -> Result<()> {
        self.inner
            .route(RouteMode::WriteSourceOnly, move |repository| async move {
                let tags = repository.tags();
                tags.untag(tag).await
            })
            .await
    }
}
