//! Alternate-source strategies
//!
//! A strategy decides where content originally addressed via a primary
//! reference may also be found. It is consulted at most twice for a given
//! [`MirroredRepository`](crate::MirroredRepository): once proactively
//! before the first request, and once reactively after a failed first
//! attempt when the proactive call offered no opinion.

use async_trait::async_trait;
use regatta_core::{RepositoryRef, Result};

/// Policy producing ranked candidate references for a primary reference
///
/// Both operations return:
/// - `Ok(None)` — no opinion; the client tries the primary alone and may
///   consult [`on_failure`](Self::on_failure) later.
/// - `Ok(Some(vec![]))` — explicit decision that there is no valid source;
///   every operation fails immediately.
/// - `Ok(Some(candidates))` — authoritative search order. Once a non-empty
///   proactive answer is given it is final: `on_failure` is never consulted
///   for that repository instance, even if every proactive candidate fails.
///   A strategy must front-load all known mirrors if it wants them tried.
#[async_trait]
pub trait AlternateSourceStrategy: Send + Sync {
    /// Called once, before any network request to the primary
    async fn first_request(&self, primary: &RepositoryRef)
        -> Result<Option<Vec<RepositoryRef>>>;

    /// Called at most once, after the first real attempt against the
    /// primary failed and `first_request` returned no opinion
    async fn on_failure(&self, primary: &RepositoryRef) -> Result<Option<Vec<RepositoryRef>>>;
}

/// A strategy backed by a fixed mirror list
///
/// In reactive mode the mirrors are offered only after the primary has
/// failed; in proactive mode they replace the search order outright, so the
/// list should include the primary wherever it belongs in that order.
#[derive(Debug, Clone)]
pub struct StaticMirrorStrategy {
    mirrors: Vec<RepositoryRef>,
    proactive: bool,
}

impl StaticMirrorStrategy {
    /// Mirrors consulted only after the primary fails
    pub fn reactive(mirrors: Vec<RepositoryRef>) -> Self {
        Self {
            mirrors,
            proactive: false,
        }
    }

    /// Mirrors that define the search order up front
    pub fn proactive(mirrors: Vec<RepositoryRef>) -> Self {
        Self {
            mirrors,
            proactive: true,
        }
    }
}

#[async_trait]
impl AlternateSourceStrategy for StaticMirrorStrategy {
    async fn first_request(
        &self,
        _primary: &RepositoryRef,
    ) -> Result<Option<Vec<RepositoryRef>>> {
        if self.proactive {
            Ok(Some(self.mirrors.clone()))
        } else {
            Ok(None)
        }
    }

    async fn on_failure(&self, _primary: &RepositoryRef) -> Result<Option<Vec<RepositoryRef>>> {
        Ok(Some(self.mirrors.clone()))
    }
}
