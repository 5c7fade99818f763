//! Error types for the Scry projection engine.
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot header too short: {0} bytes")] MissingHeader(usize),
    #[error("uid {uid} out of range (max uid {max_uid})")] UidOutOfRange { uid: u32, max_uid: u32 },
    #[error("duplicate uid: {0}")] DuplicateUid(u32),
    #[error("zero-weight transaction: uid {0}")] ZeroWeight(u32),
    #[error("weight {weight} exceeds block ceiling on uid {uid}")] OversizedWeight { uid: u32, weight: u32 },
    #[error("sigop cost {sigops} exceeds block ceiling on uid {uid}")] OversizedSigops { uid: u32, sigops: u32 },
    #[error("non-finite or negative fee on uid {0}")] InvalidFee(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("projection run cancelled")] Cancelled,
    #[error("builder invariant violated: {0}")] Invariant(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectError {
    #[error("snapshot too large: {txs} transactions > limit {limit}")] SnapshotTooLarge { txs: usize, limit: usize },
    #[error("projection run timed out after {0:?}")] Timeout(Duration),
    #[error("projection run superseded by generation {newest}")] Superseded { newest: u64 },
    #[error("projection worker panicked")] WorkerPanicked,
    #[error(transparent)] Build(#[from] BuildError),
}
