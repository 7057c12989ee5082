//! Common test helpers for regatta-client integration tests
//!
//! Provides an in-memory fake registry with scripted per-reference
//! outcomes, plus a counting strategy. All collaborators behind the
//! capability traits are faked; the tests assert on the interactions the
//! failover orchestrator has with them.

use async_trait::async_trait;
use bytes::Bytes;
use regatta_client::{
    AlternateSourceStrategy, BlobStore, BlobWriter, ManifestStore, RegistryConnector, Repository,
    TagStore,
};
use regatta_core::{
    Descriptor, Digest, Error, ErrorCode, Manifest, ManifestOptions, RepositoryRef, Result,
};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

pub const MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

pub fn primary() -> RepositoryRef {
    RepositoryRef::new("registry.test", "app/web")
}

pub fn mirror(host: &str) -> RepositoryRef {
    RepositoryRef::new(host, "app/web")
}

pub fn fixture_digest() -> Digest {
    Digest::parse("sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef")
        .unwrap()
}

pub fn fixture_blob() -> Bytes {
    Bytes::from_static(b"layer-bytes-layer-bytes-layer-bytes")
}

pub fn fixture_manifest() -> Manifest {
    Manifest::new(
        MEDIA_TYPE,
        fixture_digest(),
        Bytes::from_static(b"{\"schemaVersion\":2}"),
    )
}

pub fn fixture_descriptor() -> Descriptor {
    Descriptor::new(MEDIA_TYPE, fixture_digest(), fixture_blob().len() as u64)
}

/// Scripted behavior for one reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Script {
    /// Connect fails outright
    Unreachable,
    /// Connects; every operation succeeds with the fixture content
    Serves,
    /// Connects; every operation is rejected with a registry error code
    Rejects,
    /// Connects; streaming writes half the blob into the sink, then fails
    PartialTransfer,
}

/// Shared interaction log, keyed lines like "blob.get mirror-a.test/app/web"
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl CallLog {
    pub fn record(&self, op: &str, reference: &RepositoryRef) {
        self.calls.lock().unwrap().push(format!("{} {}", op, reference));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    pub fn assert_called(&self, needle: &str) {
        assert!(
            self.count(needle) > 0,
            "{:?} never happened. Actual calls: {:#?}",
            needle,
            self.calls()
        );
    }

    pub fn assert_never_called(&self, needle: &str) {
        assert_eq!(
            self.count(needle),
            0,
            "{:?} happened unexpectedly. Actual calls: {:#?}",
            needle,
            self.calls()
        );
    }
}

/// Connector serving scripted fake repositories
pub struct FakeConnector {
    scripts: HashMap<RepositoryRef, Script>,
    pub log: CallLog,
}

#[allow(dead_code)]
impl FakeConnector {
    pub fn new(scripts: Vec<(RepositoryRef, Script)>) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts.into_iter().collect(),
            log: CallLog::default(),
        })
    }

    /// Number of connection attempts made against a reference, in either
    /// transport posture
    pub fn connects_to(&self, reference: &RepositoryRef) -> usize {
        let suffix = format!(" {}", reference);
        self.log
            .calls()
            .iter()
            .filter(|line| line.starts_with("connect") && line.ends_with(&suffix))
            .count()
    }

    /// Total connection attempts
    pub fn total_connects(&self) -> usize {
        self.log
            .calls()
            .iter()
            .filter(|line| line.starts_with("connect"))
            .count()
    }
}

#[async_trait]
impl RegistryConnector for FakeConnector {
    async fn connect(
        &self,
        reference: &RepositoryRef,
        insecure: bool,
    ) -> Result<Arc<dyn Repository>> {
        self.log.record(
            if insecure { "connect(insecure)" } else { "connect" },
            reference,
        );
        match self.scripts.get(reference) {
            None | Some(Script::Unreachable) => Err(Error::connect(
                reference.clone(),
                io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            )),
            Some(script) => Ok(Arc::new(FakeRepository {
                reference: reference.clone(),
                script: *script,
                log: self.log.clone(),
                manifest_builds: AtomicU32::new(0),
            })),
        }
    }
}

pub struct FakeRepository {
    reference: RepositoryRef,
    script: Script,
    log: CallLog,
    manifest_builds: AtomicU32,
}

#[async_trait]
impl Repository for FakeRepository {
    fn named(&self) -> &RepositoryRef {
        &self.reference
    }

    fn blobs(&self) -> Arc<dyn BlobStore> {
        Arc::new(FakeBlobs {
            reference: self.reference.clone(),
            script: self.script,
            log: self.log.clone(),
        })
    }

    async fn manifests(&self, _options: &ManifestOptions) -> Result<Arc<dyn ManifestStore>> {
        let build = self.manifest_builds.fetch_add(1, Ordering::SeqCst) + 1;
        self.log
            .record(&format!("manifests.build#{}", build), &self.reference);
        Ok(Arc::new(FakeManifests {
            reference: self.reference.clone(),
            script: self.script,
            log: self.log.clone(),
        }))
    }

    fn tags(&self) -> Arc<dyn TagStore> {
        Arc::new(FakeTags {
            reference: self.reference.clone(),
            log: self.log.clone(),
        })
    }
}

fn rejection(reference: &RepositoryRef) -> Error {
    Error::registry(
        ErrorCode::ManifestUnknown,
        format!("not found on {}", reference),
    )
}

pub struct FakeBlobs {
    reference: RepositoryRef,
    script: Script,
    log: CallLog,
}

#[async_trait]
impl BlobStore for FakeBlobs {
    async fn get(&self, _digest: &Digest) -> Result<Bytes> {
        self.log.record("blob.get", &self.reference);
        match self.script {
            Script::Serves => Ok(fixture_blob()),
            _ => Err(rejection(&self.reference)),
        }
    }

    async fn stat(&self, _digest: &Digest) -> Result<Descriptor> {
        self.log.record("blob.stat", &self.reference);
        match self.script {
            Script::Serves => Ok(fixture_descriptor()),
            _ => Err(rejection(&self.reference)),
        }
    }

    async fn open(&self, _digest: &Digest) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        self.log.record("blob.open", &self.reference);
        match self.script {
            Script::Serves => Ok(Box::new(io::Cursor::new(fixture_blob().to_vec()))),
            _ => Err(rejection(&self.reference)),
        }
    }

    async fn serve(
        &self,
        _digest: &Digest,
        out: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()> {
        self.log.record("blob.serve", &self.reference);
        match self.script {
            Script::Serves => {
                out.write_all(&fixture_blob()).await?;
                Ok(())
            }
            Script::PartialTransfer => {
                let blob = fixture_blob();
                out.write_all(&blob[..blob.len() / 2]).await?;
                Err(Error::Transfer(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "connection reset mid-copy",
                )))
            }
            _ => Err(rejection(&self.reference)),
        }
    }

    async fn create(&self) -> Result<Box<dyn BlobWriter>> {
        self.log.record("blob.create", &self.reference);
        Ok(Box::new(FakeWriter::new(self.log.clone(), &self.reference)))
    }

    async fn put(&self, _media_type: &str, payload: Bytes) -> Result<Descriptor> {
        self.log.record("blob.put", &self.reference);
        Ok(Descriptor::new(MEDIA_TYPE, fixture_digest(), payload.len() as u64))
    }

    async fn resume(&self, _id: &str) -> Result<Box<dyn BlobWriter>> {
        self.log.record("blob.resume", &self.reference);
        Ok(Box::new(FakeWriter::new(self.log.clone(), &self.reference)))
    }

    async fn delete(&self, _digest: &Digest) -> Result<()> {
        self.log.record("blob.delete", &self.reference);
        Ok(())
    }
}

pub struct FakeWriter {
    id: String,
    log: CallLog,
    reference: RepositoryRef,
    #[allow(dead_code)]
    written: Vec<u8>,
}

impl FakeWriter {
    fn new(log: CallLog, reference: &RepositoryRef) -> Self {
        Self {
            id: "upload-1".to_string(),
            log,
            reference: reference.clone(),
            written: Vec::new(),
        }
    }
}

#[async_trait]
impl BlobWriter for FakeWriter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.written.extend_from_slice(&chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>, expected: Descriptor) -> Result<Descriptor> {
        self.log.record("blob.commit", &self.reference);
        Ok(expected)
    }

    async fn cancel(self: Box<Self>) -> Result<()> {
        self.log.record("blob.cancel", &self.reference);
        Ok(())
    }
}

pub struct FakeManifests {
    reference: RepositoryRef,
    script: Script,
    log: CallLog,
}

#[async_trait]
impl ManifestStore for FakeManifests {
    async fn get(&self, _digest: &Digest) -> Result<Manifest> {
        self.log.record("manifest.get", &self.reference);
        match self.script {
            Script::Serves => Ok(fixture_manifest()),
            _ => Err(rejection(&self.reference)),
        }
    }

    async fn exists(&self, _digest: &Digest) -> Result<bool> {
        self.log.record("manifest.exists", &self.reference);
        match self.script {
            Script::Serves => Ok(true),
            _ => Err(rejection(&self.reference)),
        }
    }

    async fn put(&self, manifest: Manifest) -> Result<Digest> {
        self.log.record("manifest.put", &self.reference);
        Ok(manifest.digest)
    }

    async fn delete(&self, _digest: &Digest) -> Result<()> {
        self.log.record("manifest.delete", &self.reference);
        Ok(())
    }
}

pub struct FakeTags {
    reference: RepositoryRef,
    log: CallLog,
}

#[async_trait]
impl TagStore for FakeTags {
    async fn get(&self, _tag: &str) -> Result<Descriptor> {
        self.log.record("tag.get", &self.reference);
        Ok(fixture_descriptor())
    }

    async fn all(&self) -> Result<Vec<String>> {
        self.log.record("tag.all", &self.reference);
        Ok(vec!["latest".to_string(), "v1.2.3".to_string()])
    }

    async fn lookup(&self, _descriptor: &Descriptor) -> Result<Vec<String>> {
        self.log.record("tag.lookup", &self.reference);
        Ok(vec!["latest".to_string()])
    }

    async fn tag(&self, _tag: &str, _descriptor: &Descriptor) -> Result<()> {
        self.log.record("tag.tag", &self.reference);
        Ok(())
    }

    async fn untag(&self, _tag: &str) -> Result<()> {
        self.log.record("tag.untag", &self.reference);
        Ok(())
    }
}

/// Strategy wrapper counting how often each phase is consulted
pub struct CountingStrategy {
    first: Option<Vec<RepositoryRef>>,
    failure: Option<Vec<RepositoryRef>>,
    pub first_calls: AtomicU32,
    pub failure_calls: AtomicU32,
}

#[allow(dead_code)]
impl CountingStrategy {
    pub fn proactive(candidates: Vec<RepositoryRef>) -> Arc<Self> {
        Arc::new(Self {
            first: Some(candidates),
            failure: None,
            first_calls: AtomicU32::new(0),
            failure_calls: AtomicU32::new(0),
        })
    }

    pub fn reactive(candidates: Vec<RepositoryRef>) -> Arc<Self> {
        Arc::new(Self {
            first: None,
            failure: Some(candidates),
            first_calls: AtomicU32::new(0),
            failure_calls: AtomicU32::new(0),
        })
    }

    pub fn first_calls(&self) -> u32 {
        self.first_calls.load(Ordering::SeqCst)
    }

    pub fn failure_calls(&self) -> u32 {
        self.failure_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlternateSourceStrategy for CountingStrategy {
    async fn first_request(&self, _primary: &RepositoryRef) -> Result<Option<Vec<RepositoryRef>>> {
        self.first_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.first.clone())
    }

    async fn on_failure(&self, _primary: &RepositoryRef) -> Result<Option<Vec<RepositoryRef>>> {
        self.failure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.failure.clone())
    }
}
