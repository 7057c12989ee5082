//! Retry-safety classification
//!
//! Streaming operations write directly into a caller-supplied sink. Once any
//! bytes may have reached that sink, retrying against another registry would
//! corrupt the output, so the failover loop may only continue past failures
//! where the remote rejected the request outright and nothing was
//! transferred. This module is the single place that decision lives.

use crate::error::Error;

/// Returns true when the error means the registry responded but rejected the
/// request, with no payload bytes delivered to the caller.
///
/// Request errors are safe to retry against the next candidate even for
/// streaming operations. Everything else must be treated as though the
/// transfer may have started:
///
/// - `Connect` failures are handled separately by the candidate loop (the
///   candidate is skipped before any request is issued), so they are not
///   request errors.
/// - `Transfer` and `Canceled` can surface mid-copy.
/// - `Strategy`, `NoValidSources`, and the parse errors never come from a
///   remote request at all.
/// - `Other` is collaborator-defined and therefore unclassifiable; assume
///   the unsafe case.
pub fn is_request_error(err: &Error) -> bool {
    // Exhaustive on purpose: a new variant must pick a side here.
    match err {
        Error::Registry { .. } | Error::UnexpectedStatus { .. } | Error::Credentials { .. } => true,
        Error::Strategy { .. }
        | Error::Connect { .. }
        | Error::Transfer(_)
        | Error::Canceled
        | Error::NoValidSources { .. }
        | Error::InvalidReference { .. }
        | Error::InvalidDigest { .. }
        | Error::Other(_) => false,
    }
}
