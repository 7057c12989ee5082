//! Repository capability traits
//!
//! These traits are the boundary between the failover orchestration in this
//! crate and the registry wire protocol, which lives elsewhere. A transport
//! implements [`RegistryConnector`] plus the per-capability stores; the
//! mirrored client consumes them and re-exposes the same surface, so a
//! mirrored repository is substitutable wherever a plain one is accepted.

use async_trait::async_trait;
use bytes::Bytes;
use regatta_core::{Descriptor, Digest, Manifest, ManifestOptions, RepositoryRef, Result};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Connects to the registry a reference names
///
/// `insecure` requests a defensive transport posture (e.g., tolerating plain
/// HTTP or unverifiable certificates). The mirrored client forces it on for
/// every candidate other than the declared primary.
#[async_trait]
pub trait RegistryConnector: Send + Sync {
    async fn connect(
        &self,
        reference: &RepositoryRef,
        insecure: bool,
    ) -> Result<Arc<dyn Repository>>;
}

/// A connected repository handle
#[async_trait]
pub trait Repository: Send + Sync {
    /// The reference this handle was connected for
    fn named(&self) -> &RepositoryRef;

    /// Blob storage and streaming operations
    fn blobs(&self) -> Arc<dyn BlobStore>;

    /// Manifest operations
    ///
    /// The returned service carries the accept options it was built with, so
    /// callers must reuse one service per repository rather than rebuilding
    /// it per request.
    async fn manifests(&self, options: &ManifestOptions) -> Result<Arc<dyn ManifestStore>>;

    /// Tag operations
    fn tags(&self) -> Arc<dyn TagStore>;
}

/// Blob operations against a single repository
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob fully into memory
    async fn get(&self, digest: &Digest) -> Result<Bytes>;

    /// Fetch a blob's descriptor without its content
    async fn stat(&self, digest: &Digest) -> Result<Descriptor>;

    /// Open a blob for reading
    async fn open(&self, digest: &Digest) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    /// Stream a blob directly into the caller's sink
    ///
    /// Unlike [`get`](Self::get), bytes reach the sink as they arrive; a
    /// failure partway through leaves the sink partially written.
    async fn serve(
        &self,
        digest: &Digest,
        out: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()>;

    /// Begin a new blob upload
    async fn create(&self) -> Result<Box<dyn BlobWriter>>;

    /// Upload a blob in one shot
    async fn put(&self, media_type: &str, payload: Bytes) -> Result<Descriptor>;

    /// Resume an interrupted upload by session id
    async fn resume(&self, id: &str) -> Result<Box<dyn BlobWriter>>;

    /// Delete a blob
    async fn delete(&self, digest: &Digest) -> Result<()>;
}

/// An in-progress blob upload session
#[async_trait]
pub trait BlobWriter: Send {
    /// Session id, usable with [`BlobStore::resume`]
    fn id(&self) -> &str;

    /// Append a chunk to the upload
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Complete the upload, verifying it against the expected descriptor
    async fn commit(self: Box<Self>, expected: Descriptor) -> Result<Descriptor>;

    /// Abandon the upload
    async fn cancel(self: Box<Self>) -> Result<()>;
}

/// Manifest operations against a single repository
#[async_trait]
pub trait ManifestStore: Send + Sync {
    async fn get(&self, digest: &Digest) -> Result<Manifest>;

    async fn exists(&self, digest: &Digest) -> Result<bool>;

    /// Store a manifest, returning its digest
    async fn put(&self, manifest: Manifest) -> Result<Digest>;

    async fn delete(&self, digest: &Digest) -> Result<()>;
}

/// Tag operations against a single repository
///
/// Tags are mutable pointers rather than content-addressed objects, so no
/// tag operation is ever mirrored; see the routing table in
/// [`crate::mirrored`].
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Resolve a tag to the descriptor it points at
    async fn get(&self, tag: &str) -> Result<Descriptor>;

    /// List every tag in the repository
    async fn all(&self) -> Result<Vec<String>>;

    /// Find the tags currently pointing at a descriptor
    async fn lookup(&self, descriptor: &Descriptor) -> Result<Vec<String>>;

    /// Point a tag at a descriptor
    async fn tag(&self, tag: &str, descriptor: &Descriptor) -> Result<()>;

    /// Remove a tag
    async fn untag(&self, tag: &str) -> Result<()>;
}
