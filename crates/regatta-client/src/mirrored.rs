//! Failover orchestration over ranked alternate sources
//!
//! [`MirroredRepository`] wraps a connected-repository capability with the
//! retry machinery that makes content-addressed reads resilient: when the
//! primary registry is unreachable or rejects a request, the same logical
//! request is retried against a ranked list of alternate references produced
//! by an [`AlternateSourceStrategy`](crate::AlternateSourceStrategy).
//!
//! Every operation routes through exactly one of three modes:
//!
//! - `ReadMirrored` — repeatable reads of content-addressed data; tried
//!   against every candidate in order, first success wins.
//! - `ReadStreamSingleShot` — streaming reads into a caller-supplied sink;
//!   candidates are tried until one is reachable, but once any bytes may
//!   have been written the operation aborts rather than corrupt the sink.
//! - `WriteSourceOnly` — mutations and tag operations; only the declared
//!   primary is ever contacted.
//!
//! Candidate resolution is two-phase. The strategy is asked proactively
//! before the first request; if it offers no opinion the primary is tried
//! alone, and only after that fails is the strategy asked reactively. A
//! non-empty proactive answer is final: the reactive call is never made for
//! that instance, even if every proactive candidate fails.

use crate::facade::{MirroredBlobs, MirroredManifests, MirroredTags};
use crate::repository::{BlobStore, ManifestStore, RegistryConnector, Repository, TagStore};
use crate::strategy::AlternateSourceStrategy;
use async_trait::async_trait;
use regatta_core::{is_request_error, Error, ManifestOptions, RepositoryRef, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// Routing mode for a repository operation
///
/// Every facade method declares its mode explicitly; the classification is
/// the safety-critical piece of this design, so it is dispatched through the
/// single [`route`](MirrorInner::route) executor rather than duplicated per
/// method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    /// Repeatable read of content-addressed data; mirrored with failover
    ReadMirrored,
    /// Single-shot streaming read; stop at the first reachable candidate
    ReadStreamSingleShot,
    /// Mutation or tag operation; primary only
    WriteSourceOnly,
}

/// Whether the cached candidate list is authoritative yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// The strategy has committed to an answer; no reactive second chance
    Loaded,
    /// Only the primary was assumed; the strategy may still be consulted
    NotYetLoaded,
}

/// Outcome of one streaming pass over a candidate list
enum StreamOutcome<T> {
    /// A candidate served the stream
    Served(T),
    /// Every candidate was unreachable or rejected the request outright
    Rejected(Error),
    /// A candidate failed after the transfer may have begun
    Aborted(Error),
}

#[derive(Default)]
struct MirrorState {
    /// Authoritative candidate order; `None` until the strategy commits
    candidates: Option<Vec<RepositoryRef>>,
    /// Whether the proactive consultation has happened
    ///
    /// Tracked apart from `candidates` because a no-opinion answer leaves
    /// the list unresolved (the reactive call may still fill it) while the
    /// proactive question must not be asked again.
    first_request_done: bool,
    /// Connected handles, one per distinct reference, never evicted
    connections: HashMap<RepositoryRef, Arc<dyn Repository>>,
}

pub(crate) struct MirrorInner {
    primary: RepositoryRef,
    insecure: bool,
    connector: Arc<dyn RegistryConnector>,
    strategy: Option<Arc<dyn AlternateSourceStrategy>>,
    /// One lock covers candidate resolution and the connection cache so the
    /// strategy is consulted at most once per phase and each reference is
    /// connected at most once, under any call concurrency.
    state: Mutex<MirrorState>,
}

impl MirrorInner {
    /// Resolve the candidate search order, consulting the strategy's
    /// proactive answer at most once per instance
    ///
    /// A no-opinion answer leaves the candidate list unresolved so the
    /// strategy keeps its reactive second chance, but the proactive question
    /// itself is never repeated.
    async fn resolve_candidates(&self) -> Result<(Vec<RepositoryRef>, Resolution)> {
        let Some(strategy) = &self.strategy else {
            return Ok((vec![self.primary.clone()], Resolution::NotYetLoaded));
        };

        let mut state = self.state.lock().await;
        if let Some(candidates) = &state.candidates {
            return Ok((candidates.clone(), Resolution::Loaded));
        }
        if state.first_request_done {
            return Ok((vec![self.primary.clone()], Resolution::NotYetLoaded));
        }

        state.first_request_done = true;
        match strategy.first_request(&self.primary).await? {
            Some(candidates) => {
                debug!(
                    "resolved {} alternate source(s) for {} up front",
                    candidates.len(),
                    self.primary
                );
                state.candidates = Some(candidates.clone());
                Ok((candidates, Resolution::Loaded))
            }
            None => Ok((vec![self.primary.clone()], Resolution::NotYetLoaded)),
        }
    }

    /// Resolve candidates reactively after a failed first attempt
    ///
    /// Another caller may have resolved the list while the failed attempt
    /// was in flight, so the cache is re-checked under the lock before the
    /// strategy is consulted. The answer is cached even when empty.
    async fn resolve_alternates_on_failure(&self) -> Result<Vec<RepositoryRef>> {
        let Some(strategy) = &self.strategy else {
            return Ok(Vec::new());
        };

        let mut state = self.state.lock().await;
        if let Some(candidates) = &state.candidates {
            return Ok(candidates.clone());
        }

        let candidates = strategy.on_failure(&self.primary).await?.unwrap_or_default();
        debug!(
            "resolved {} alternate source(s) for {} after failure",
            candidates.len(),
            self.primary
        );
        state.candidates = Some(candidates.clone());
        Ok(candidates)
    }

    /// Connect to a candidate, memoizing the handle per reference
    ///
    /// The primary keeps the caller's declared transport posture; every
    /// other candidate is a corroborating mirror and is connected
    /// defensively regardless of that posture.
    pub(crate) async fn cached_connect(
        &self,
        reference: &RepositoryRef,
    ) -> Result<Arc<dyn Repository>> {
        let insecure = if *reference == self.primary {
            self.insecure
        } else {
            true
        };

        let mut state = self.state.lock().await;
        if let Some(repository) = state.connections.get(reference) {
            trace!("reusing connection to {}", reference);
            return Ok(repository.clone());
        }

        debug!("connecting to {} (insecure={})", reference, insecure);
        let repository = self.connector.connect(reference, insecure).await?;
        state
            .connections
            .insert(reference.clone(), repository.clone());
        Ok(repository)
    }

    /// Try every candidate in order, returning the first success
    ///
    /// The first error seen is preserved: it names the most representative
    /// failure, typically against the preferred source.
    async fn try_all<T, F, Fut>(&self, candidates: &[RepositoryRef], op: &F) -> Result<T>
    where
        F: Fn(Arc<dyn Repository>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut first_err: Option<Error> = None;

        for candidate in candidates {
            let repository = match self.cached_connect(candidate).await {
                Ok(repository) => repository,
                Err(err) => {
                    warn!("skipping {}: {}", candidate, err);
                    first_err.get_or_insert(err);
                    continue;
                }
            };

            match op(repository).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!("request to {} failed: {}", candidate, err);
                    first_err.get_or_insert(err);
                }
            }
        }

        Err(first_err.unwrap_or_else(|| Error::no_valid_sources(self.primary.clone())))
    }

    /// Two-phase mirrored read: proactive candidates, then the reactive
    /// list when the strategy had not yet committed
    pub(crate) async fn with_failover<T, F, Fut>(&self, op: &F) -> Result<T>
    where
        F: Fn(Arc<dyn Repository>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let (candidates, resolution) = self.resolve_candidates().await?;

        let primary_err = match self.try_all(&candidates, op).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if resolution == Resolution::Loaded || self.strategy.is_none() {
            return Err(primary_err);
        }

        let alternates = self.resolve_alternates_on_failure().await?;
        if alternates.is_empty() {
            return Err(primary_err);
        }

        debug!(
            "retrying against {} alternate source(s) for {}",
            alternates.len(),
            self.primary
        );
        match self.try_all(&alternates, op).await {
            Ok(value) => Ok(value),
            // The original error is the representative diagnostic.
            Err(_) => Err(primary_err),
        }
    }

    /// One streaming pass over a candidate list
    ///
    /// Candidates that cannot be connected or that reject the request
    /// outright are skipped. Any other failure aborts: the sink may already
    /// hold partial output and must not receive a second copy.
    async fn first_connected_over<T, F, Fut>(
        &self,
        candidates: &[RepositoryRef],
        op: &F,
    ) -> StreamOutcome<T>
    where
        F: Fn(Arc<dyn Repository>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut first_err: Option<Error> = None;

        for candidate in candidates {
            let repository = match self.cached_connect(candidate).await {
                Ok(repository) => repository,
                Err(err) => {
                    warn!("skipping {}: {}", candidate, err);
                    first_err.get_or_insert(err);
                    continue;
                }
            };

            match op(repository).await {
                Ok(value) => return StreamOutcome::Served(value),
                Err(err) if is_request_error(&err) => {
                    warn!("request to {} rejected: {}", candidate, err);
                    first_err.get_or_insert(err);
                }
                Err(err) => {
                    debug!("aborting stream after failure against {}", candidate);
                    return StreamOutcome::Aborted(err);
                }
            }
        }

        StreamOutcome::Rejected(
            first_err.unwrap_or_else(|| Error::no_valid_sources(self.primary.clone())),
        )
    }

    /// Two-phase single-shot stream, mirroring [`with_failover`]'s strategy
    /// consultation but with the no-retry-after-partial-transfer rule
    pub(crate) async fn first_connected<T, F, Fut>(&self, op: &F) -> Result<T>
    where
        F: Fn(Arc<dyn Repository>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let (candidates, resolution) = self.resolve_candidates().await?;

        let primary_err = match self.first_connected_over(&candidates, op).await {
            StreamOutcome::Served(value) => return Ok(value),
            StreamOutcome::Aborted(err) => return Err(err),
            StreamOutcome::Rejected(err) => err,
        };

        if resolution == Resolution::Loaded || self.strategy.is_none() {
            return Err(primary_err);
        }

        let alternates = self.resolve_alternates_on_failure().await?;
        if alternates.is_empty() {
            return Err(primary_err);
        }

        match self.first_connected_over(&alternates, op).await {
            StreamOutcome::Served(value) => Ok(value),
            StreamOutcome::Aborted(err) => Err(err),
            StreamOutcome::Rejected(_) => Err(primary_err),
        }
    }

    /// Bypass mirroring entirely: primary only, declared posture only
    pub(crate) async fn source_only<T, F, Fut>(&self, op: &F) -> Result<T>
    where
        F: Fn(Arc<dyn Repository>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let repository = self.cached_connect(&self.primary).await?;
        op(repository).await
    }

    /// The shared executor every facade method dispatches through
    pub(crate) async fn route<T, F, Fut>(&self, mode: RouteMode, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn Repository>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        match mode {
            RouteMode::ReadMirrored => self.with_failover(&op).await,
            RouteMode::ReadStreamSingleShot => self.first_connected(&op).await,
            RouteMode::WriteSourceOnly => self.source_only(&op).await,
        }
    }

    pub(crate) fn primary(&self) -> &RepositoryRef {
        &self.primary
    }
}

/// A repository client that transparently retries content-addressed reads
/// against alternate sources
///
/// Cloning is cheap and shares the candidate list and connection cache.
/// State lives for the life of the instance: candidates are resolved once,
/// connections are memoized per reference and never evicted. Create one per
/// logical repository session and discard it when done.
#[derive(Clone)]
pub struct MirroredRepository {
    inner: Arc<MirrorInner>,
}

impl MirroredRepository {
    /// Wrap a connector for a primary reference
    ///
    /// `insecure` is the caller's declared transport posture for the
    /// primary; alternates are always connected defensively.
    pub fn new(
        connector: Arc<dyn RegistryConnector>,
        primary: RepositoryRef,
        insecure: bool,
    ) -> Self {
        Self {
            inner: Arc::new(MirrorInner {
                primary,
                insecure,
                connector,
                strategy: None,
                state: Mutex::new(MirrorState::default()),
            }),
        }
    }

    /// Attach an alternate-source strategy
    ///
    /// Without one, every operation targets the primary alone.
    pub fn with_strategy(self, strategy: Arc<dyn AlternateSourceStrategy>) -> Self {
        Self {
            inner: Arc::new(MirrorInner {
                primary: self.inner.primary.clone(),
                insecure: self.inner.insecure,
                connector: self.inner.connector.clone(),
                strategy: Some(strategy),
                state: Mutex::new(MirrorState::default()),
            }),
        }
    }

    /// The primary reference this client was created for
    pub fn named(&self) -> &RepositoryRef {
        self.inner.primary()
    }

    /// Blob facade
    pub fn blobs(&self) -> MirroredBlobs {
        MirroredBlobs::new(self.inner.clone())
    }

    /// Manifest facade built with the given accept options
    ///
    /// The facade caches one manifest service per candidate so the options
    /// are applied consistently across repeated calls.
    pub fn manifests(&self, options: ManifestOptions) -> MirroredManifests {
        MirroredManifests::new(self.inner.clone(), options)
    }

    /// Tag facade
    pub fn tags(&self) -> MirroredTags {
        MirroredTags::new(self.inner.clone())
    }
}

#[async_trait]
impl Repository for MirroredRepository {
    fn named(&self) -> &RepositoryRef {
        self.inner.primary()
    }

    fn blobs(&self) -> Arc<dyn BlobStore> {
        Arc::new(MirroredBlobs::new(self.inner.clone()))
    }

    async fn manifests(&self, options: &ManifestOptions) -> Result<Arc<dyn ManifestStore>> {
        Ok(Arc::new(MirroredManifests::new(
            self.inner.clone(),
            options.clone(),
        )))
    }

    fn tags(&self) -> Arc<dyn TagStore> {
        Arc::new(MirroredTags::new(self.inner.clone()))
    }
}
