//! Binary snapshot codec.
//!
//! The live mempool tracker hands the engine a serialized snapshot: a header
//! (`tx_count: u32`, `max_uid: u32`) followed by `tx_count` fixed-shape
//! records, all integers little-endian:
//!
//! ```text
//! uid: u32 | fee: f64 | weight: u32 | sigops: u32 |
//! effective_feerate: f64 | num_parents: u32 | num_parents × parent_uid: u32
//! ```
//!
//! Decoding is a pure transform and never poisons the whole run on a bad
//! record: structurally invalid records are dropped (and counted), invalid
//! parent edges are dropped from otherwise valid records, and a truncated
//! buffer ends decoding at the last complete record. Descendants of a
//! dropped record simply see an orphan edge, which the resolver ignores.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::SnapshotError;
use crate::types::{Snapshot, SnapshotTx};

/// Byte length of the snapshot header.
const HEADER_BYTES: usize = 8;

/// Byte length of a record before its parent list.
const RECORD_FIXED_BYTES: usize = 32;

/// Accounting for one decode pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Records decoded into the snapshot.
    pub decoded: usize,
    /// Structurally invalid or incomplete records dropped.
    pub dropped_records: usize,
    /// Parent edges dropped from otherwise valid records.
    pub dropped_edges: usize,
    /// Whether the buffer ended before the declared record count.
    pub truncated: bool,
}

/// Decode a serialized snapshot.
///
/// Fails only when the header itself is missing; all record-level defects
/// are recovered locally and reported through [`DecodeStats`].
pub fn decode(mut buf: &[u8]) -> Result<(Snapshot, DecodeStats), SnapshotError> {
    if buf.len() < HEADER_BYTES {
        return Err(SnapshotError::MissingHeader(buf.len()));
    }
    let tx_count = buf.get_u32_le() as usize;
    let max_uid = buf.get_u32_le();

    let mut snapshot = Snapshot::new(max_uid);
    let mut stats = DecodeStats::default();

    for _ in 0..tx_count {
        if buf.remaining() < RECORD_FIXED_BYTES {
            if buf.has_remaining() {
                // A partial record counts as dropped.
                stats.dropped_records += 1;
            }
            stats.truncated = true;
            break;
        }

        let uid = buf.get_u32_le();
        let fee = buf.get_f64_le();
        let weight = buf.get_u32_le();
        let sigops = buf.get_u32_le();
        let effective_feerate = buf.get_f64_le();
        let num_parents = buf.get_u32_le() as usize;

        if buf.remaining() < num_parents * 4 {
            stats.dropped_records += 1;
            stats.truncated = true;
            break;
        }
        let mut parents = Vec::with_capacity(num_parents);
        for _ in 0..num_parents {
            parents.push(buf.get_u32_le());
        }

        let record = SnapshotTx {
            uid,
            order: uid,
            fee,
            weight,
            sigops,
            effective_feerate,
            parents,
        };
        match snapshot.insert(record) {
            Ok(dropped_edges) => {
                if dropped_edges > 0 {
                    warn!("uid {uid}: dropped {dropped_edges} invalid parent edge(s)");
                    stats.dropped_edges += dropped_edges;
                }
                stats.decoded += 1;
            }
            Err(e) => {
                warn!("dropping invalid snapshot record: {e}");
                stats.dropped_records += 1;
            }
        }
    }

    if stats.truncated {
        warn!(
            "truncated snapshot: decoded {} of {} declared records",
            stats.decoded, tx_count
        );
    }
    debug!(
        "decoded snapshot: {} txs, max_uid {}, {} records dropped, {} edges dropped",
        stats.decoded, max_uid, stats.dropped_records, stats.dropped_edges
    );
    Ok((snapshot, stats))
}

/// Encode a snapshot into the wire format. Used by producers and tests.
pub fn encode(snapshot: &Snapshot) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_BYTES + snapshot.len() * (RECORD_FIXED_BYTES + 8));
    buf.put_u32_le(snapshot.len() as u32);
    buf.put_u32_le(snapshot.max_uid());
    for tx in snapshot.iter() {
        buf.put_u32_le(tx.uid);
        buf.put_f64_le(tx.fee);
        buf.put_u32_le(tx.weight);
        buf.put_u32_le(tx.sigops);
        buf.put_f64_le(tx.effective_feerate);
        buf.put_u32_le(tx.parents.len() as u32);
        for &parent in &tx.parents {
            buf.put_u32_le(parent);
        }
    }
    buf.freeze()
}
