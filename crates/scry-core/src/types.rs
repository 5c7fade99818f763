//! Snapshot data model: transaction records keyed by dense integer uid.
//!
//! A [`Snapshot`] is produced fresh for every projection run and is immutable
//! once handed to the builder. Transactions are identified by a `uid` that is
//! unique and dense within one snapshot; the stable [`Txid`] is kept only for
//! display and for deriving the deterministic tie-break [ordering
//! key](Txid::ordering_key).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_BLOCK_SIGOPS, MAX_BLOCK_WEIGHT};
use crate::error::SnapshotError;

/// A 32-byte stable transaction hash.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Txid(pub [u8; 32]);

impl Txid {
    /// The zero txid.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Txid from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Deterministic tie-break key: the txid's last four bytes interpreted
    /// as a little-endian u32.
    ///
    /// Packages with equal fee-rate scores are ordered by this key
    /// (descending, then by descending uid); since candidates are taken from
    /// the high end of the ordering, the transaction with the *lowest* key
    /// is selected first. The key is fixed by convention so that re-runs on
    /// identical input reproduce the same template.
    pub fn ordering_key(&self) -> u32 {
        u32::from_le_bytes([self.0[28], self.0[29], self.0[30], self.0[31]])
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Txid {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// One unconfirmed transaction record inside a snapshot.
///
/// `fee` is carried as `f64` for wire fidelity with the producer; the engine
/// converts it to integer satoshis before any accumulation so package
/// aggregates never see floating-point drift.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotTx {
    /// Dense integer identifier, unique within this snapshot.
    pub uid: u32,
    /// Tie-break ordering key (see [`Txid::ordering_key`]). Defaults to the
    /// uid until the producer installs real keys via
    /// [`Snapshot::apply_ordering`].
    pub order: u32,
    /// Fee in satoshis.
    pub fee: f64,
    /// Size in weight units. Never zero for a valid record.
    pub weight: u32,
    /// Signature-operation cost.
    pub sigops: u32,
    /// Advisory effective fee rate precomputed by the producer (sat/vB).
    pub effective_feerate: f64,
    /// Uids of in-mempool parents (transactions this one spends from).
    /// May reference uids absent from the snapshot; such orphan edges are
    /// ignored by the resolver.
    pub parents: Vec<u32>,
}

/// An immutable table of snapshot transactions, keyed by dense uid.
///
/// `max_uid` is the declared upper bound on uid values; the engine sizes its
/// working arenas to `max_uid + 1`.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    txs: Vec<SnapshotTx>,
    index: HashMap<u32, usize>,
    max_uid: u32,
}

impl Snapshot {
    /// Create an empty snapshot with the given uid upper bound.
    pub fn new(max_uid: u32) -> Self {
        Self { txs: Vec::new(), index: HashMap::new(), max_uid }
    }

    /// Insert a record, validating it against the snapshot invariants.
    ///
    /// Rejects out-of-range uids, duplicates, non-finite or negative fees,
    /// and weight or sigop values outside what a block can hold (no valid
    /// transaction outweighs a whole block, and accepting larger values
    /// would overflow the engine's size arithmetic). Self-referential or
    /// out-of-range parent edges are dropped from the record (the record
    /// itself is kept); the number of dropped edges is returned.
    pub fn insert(&mut self, mut tx: SnapshotTx) -> Result<usize, SnapshotError> {
        if tx.uid > self.max_uid {
            return Err(SnapshotError::UidOutOfRange { uid: tx.uid, max_uid: self.max_uid });
        }
        if self.index.contains_key(&tx.uid) {
            return Err(SnapshotError::DuplicateUid(tx.uid));
        }
        if tx.weight == 0 {
            return Err(SnapshotError::ZeroWeight(tx.uid));
        }
        if tx.weight > MAX_BLOCK_WEIGHT {
            return Err(SnapshotError::OversizedWeight { uid: tx.uid, weight: tx.weight });
        }
        if tx.sigops > MAX_BLOCK_SIGOPS {
            return Err(SnapshotError::OversizedSigops { uid: tx.uid, sigops: tx.sigops });
        }
        if !tx.fee.is_finite() || tx.fee < 0.0 {
            return Err(SnapshotError::InvalidFee(tx.uid));
        }

        let uid = tx.uid;
        let max_uid = self.max_uid;
        let before = tx.parents.len();
        tx.parents.retain(|&p| p != uid && p <= max_uid);
        let dropped_edges = before - tx.parents.len();

        self.index.insert(uid, self.txs.len());
        self.txs.push(tx);
        Ok(dropped_edges)
    }

    /// Install producer-supplied tie-break keys from a uid → txid mapping.
    /// Uids absent from the mapping keep their default key.
    pub fn apply_ordering(&mut self, txids: &HashMap<u32, Txid>) {
        for tx in &mut self.txs {
            if let Some(txid) = txids.get(&tx.uid) {
                tx.order = txid.ordering_key();
            }
        }
    }

    /// Look up a record by uid.
    pub fn get(&self, uid: u32) -> Option<&SnapshotTx> {
        self.index.get(&uid).map(|&i| &self.txs[i])
    }

    /// Whether the snapshot contains the given uid.
    pub fn contains(&self, uid: u32) -> bool {
        self.index.contains_key(&uid)
    }

    /// The declared uid upper bound.
    pub fn max_uid(&self) -> u32 {
        self.max_uid
    }

    /// Number of transactions in the snapshot.
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Iterate over records in insertion (snapshot) order.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotTx> {
        self.txs.iter()
    }
}
