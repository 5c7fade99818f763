//! Adversarial input tests: malformed snapshots, hostile graph shapes, and
//! truncated buffers must never break decoding or the template invariants.

use scry_core::snapshot;
use scry_engine::BuildOptions;
use scry_tests::helpers::*;

/// Hand-rolled wire writer so tests can emit records `encode` would refuse.
#[derive(Default)]
struct Wire(Vec<u8>);

impl Wire {
    fn header(mut self, tx_count: u32, max_uid: u32) -> Self {
        self.0.extend_from_slice(&tx_count.to_le_bytes());
        self.0.extend_from_slice(&max_uid.to_le_bytes());
        self
    }

    fn record(mut self, uid: u32, fee: f64, weight: u32, sigops: u32, parents: &[u32]) -> Self {
        self.0.extend_from_slice(&uid.to_le_bytes());
        self.0.extend_from_slice(&fee.to_le_bytes());
        self.0.extend_from_slice(&weight.to_le_bytes());
        self.0.extend_from_slice(&sigops.to_le_bytes());
        let rate = fee / (f64::from(weight.max(1)) / 4.0);
        self.0.extend_from_slice(&rate.to_le_bytes());
        self.0.extend_from_slice(&(parents.len() as u32).to_le_bytes());
        for parent in parents {
            self.0.extend_from_slice(&parent.to_le_bytes());
        }
        self
    }

    fn bytes(self) -> Vec<u8> {
        self.0
    }
}

// ======================================================================
// Record-level defects: dropped, decode continues
// ======================================================================

#[test]
fn out_of_range_uid_record_is_dropped() {
    let bytes = Wire::default()
        .header(2, 1)
        .record(9, 100.0, 400, 0, &[])
        .record(1, 100.0, 400, 0, &[])
        .bytes();
    let (snap, stats) = snapshot::decode(&bytes).unwrap();
    assert_eq!(stats.decoded, 1);
    assert_eq!(stats.dropped_records, 1);
    assert!(snap.contains(1));
    assert!(!snap.contains(9));
}

#[test]
fn duplicate_uid_keeps_first_record() {
    let bytes = Wire::default()
        .header(2, 1)
        .record(0, 100.0, 400, 0, &[])
        .record(0, 999.0, 800, 0, &[])
        .bytes();
    let (snap, stats) = snapshot::decode(&bytes).unwrap();
    assert_eq!(stats.decoded, 1);
    assert_eq!(stats.dropped_records, 1);
    assert_eq!(snap.get(0).unwrap().fee, 100.0);
}

#[test]
fn zero_weight_and_bad_fee_records_are_dropped() {
    let bytes = Wire::default()
        .header(4, 3)
        .record(0, 100.0, 0, 0, &[])
        .record(1, f64::NAN, 400, 0, &[])
        .record(2, -5.0, 400, 0, &[])
        .record(3, 100.0, 400, 0, &[])
        .bytes();
    let (snap, stats) = snapshot::decode(&bytes).unwrap();
    assert_eq!(stats.decoded, 1);
    assert_eq!(stats.dropped_records, 3);
    assert!(snap.contains(3));
}

#[test]
fn oversized_weight_and_sigops_records_are_dropped() {
    // Records claiming more weight or sigop cost than a whole block can
    // hold are rejected at insert, so selection arithmetic never sees them.
    let bytes = Wire::default()
        .header(3, 2)
        .record(0, 100.0, u32::MAX, 0, &[])
        .record(1, 100.0, 400, u32::MAX, &[])
        .record(2, 100.0, 400, 0, &[])
        .bytes();
    let (snap, stats) = snapshot::decode(&bytes).unwrap();
    assert_eq!(stats.decoded, 1);
    assert_eq!(stats.dropped_records, 2);
    assert!(!snap.contains(0) && !snap.contains(1));

    let template = project(&snap, &BuildOptions::default());
    assert_eq!(flatten(&template), vec![2]);
}

#[test]
fn truncated_buffer_keeps_complete_prefix() {
    let full = Wire::default()
        .header(3, 2)
        .record(0, 100.0, 400, 0, &[])
        .record(1, 100.0, 400, 0, &[])
        .record(2, 100.0, 400, 0, &[])
        .bytes();
    // Cut into the middle of the third record.
    let (snap, stats) = snapshot::decode(&full[..full.len() - 10]).unwrap();
    assert_eq!(stats.decoded, 2);
    assert_eq!(stats.dropped_records, 1);
    assert!(stats.truncated);
    assert!(snap.contains(0) && snap.contains(1));
}

#[test]
fn missing_header_is_the_only_hard_failure() {
    assert!(snapshot::decode(&[1, 2, 3]).is_err());
    // An empty but complete header decodes to an empty snapshot.
    let (snap, stats) = snapshot::decode(&Wire::default().header(0, 0).bytes()).unwrap();
    assert!(snap.is_empty());
    assert_eq!(stats, Default::default());
}

// ======================================================================
// Edge-level defects: dropped, record kept
// ======================================================================

#[test]
fn self_and_out_of_range_parent_edges_are_dropped() {
    let bytes = Wire::default()
        .header(2, 1)
        .record(0, 100.0, 400, 0, &[])
        .record(1, 100.0, 400, 0, &[1, 9, 0])
        .bytes();
    let (snap, stats) = snapshot::decode(&bytes).unwrap();
    assert_eq!(stats.decoded, 2);
    assert_eq!(stats.dropped_edges, 2);
    assert_eq!(snap.get(1).unwrap().parents, vec![0]);
}

#[test]
fn orphan_edge_survives_decode_and_projection() {
    // Parent 5 is in range but never appears; the edge is kept by the
    // decoder and ignored by the engine.
    let bytes = Wire::default()
        .header(2, 7)
        .record(0, 900.0, 400, 0, &[])
        .record(1, 500.0, 400, 0, &[5])
        .bytes();
    let (snap, stats) = snapshot::decode(&bytes).unwrap();
    assert_eq!(stats.dropped_edges, 0);
    assert_eq!(snap.get(1).unwrap().parents, vec![5]);

    let template = project(&snap, &BuildOptions::default());
    assert_eq!(flatten(&template), vec![0, 1]);
}

// ======================================================================
// Hostile graph shapes
// ======================================================================

#[test]
fn cycle_in_snapshot_still_yields_complete_template() {
    // 1 and 2 claim to spend each other. One edge is dropped; both txs
    // still appear exactly once.
    let bytes = Wire::default()
        .header(3, 2)
        .record(0, 900.0, 400, 0, &[])
        .record(1, 100.0, 400, 0, &[2])
        .record(2, 100.0, 400, 0, &[1])
        .bytes();
    let (snap, _) = snapshot::decode(&bytes).unwrap();
    let template = project(&snap, &BuildOptions::default());
    assert_partition_complete(&snap, &template);
}

#[test]
fn wide_fan_out_resolves_and_partitions() {
    // One parent with 2000 children spending it.
    let mut specs: Vec<TxSpec> = vec![(0, 100.0, 400, 0, vec![])];
    for uid in 1..=2_000u32 {
        specs.push((uid, 500.0, 400, 0, vec![0]));
    }
    let snap = make_snapshot(&specs);
    let template = project(&snap, &BuildOptions::default());
    assert_partition_complete(&snap, &template);
    assert_dependency_order(&snap, &template);
}
