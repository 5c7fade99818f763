//! End-to-end pipeline tests: encode → decode → build → format, including
//! the disk handoff and the async publisher.

use std::collections::HashMap;

use scry_core::snapshot;
use scry_core::types::Txid;
use scry_engine::BuildOptions;
use scry_node_lib::{Projector, ProjectorConfig};
use scry_tests::helpers::*;

/// A small mixed mempool exercising plain sorting, CPFP, and a package
/// whose child is richer than its score allows.
fn mixed_mempool() -> Vec<TxSpec> {
    vec![
        (0, 500.0, 800, 0, vec![]),     // 2.5 sat/vB
        (1, 2_400.0, 800, 0, vec![]),   // 12 sat/vB
        (2, 600.0, 400, 0, vec![1]),    // 6 sat/vB, capped by itself
        (3, 100.0, 400, 0, vec![]),     // 1 sat/vB, lifted by 4
        (4, 2_000.0, 400, 0, vec![3]),  // package with 3: 10.5 sat/vB
        (5, 800.0, 400, 0, vec![]),     // 8 sat/vB
    ]
}

// ======================================================================
// Golden template: exact selection order for the mixed mempool
// ======================================================================

#[test]
fn golden_template_for_mixed_mempool() {
    let snap = make_snapshot(&mixed_mempool());
    let template = project(&snap, &BuildOptions::default());

    assert_eq!(template.blocks.len(), 1);
    let block = &template.blocks[0];
    assert_eq!(block.uids, vec![1, 3, 4, 5, 2, 0]);
    assert_eq!(block.stats.tx_count, 6);
    assert_eq!(block.stats.fee_total, 6_400);
    assert_eq!(block.stats.weight, 4_000 + 3_200);

    // The CPFP pair is the only multi-tx package.
    assert_eq!(template.clusters, vec![vec![3, 4]]);
    // Both members re-rated to the package rate 2100 sat / 200 vB.
    assert_eq!(template.rates, vec![(3, 10.5), (4, 10.5)]);

    // Fee range spans the committed rates, ascending.
    assert_eq!(block.stats.fee_range.first(), Some(&2.5));
    assert_eq!(block.stats.fee_range.last(), Some(&12.0));
    assert_eq!(block.stats.median_fee, 10.5);
}

#[test]
fn identical_snapshots_yield_identical_templates() {
    let snap_a = make_snapshot(&mixed_mempool());
    let snap_b = make_snapshot(&mixed_mempool());
    let options = BuildOptions::default();
    assert_eq!(project(&snap_a, &options), project(&snap_b, &options));
}

// ======================================================================
// Wire round trip and disk handoff
// ======================================================================

#[test]
fn encoded_snapshot_projects_identically() {
    let snap = make_snapshot(&mixed_mempool());
    let bytes = snapshot::encode(&snap);
    let (decoded, stats) = snapshot::decode(&bytes).unwrap();
    assert_eq!(stats.decoded, 6);
    assert_eq!(stats.dropped_records, 0);
    assert!(!stats.truncated);

    let options = BuildOptions::default();
    assert_eq!(project(&decoded, &options), project(&snap, &options));
}

#[tokio::test]
async fn snapshot_file_projects_through_publisher() {
    let snap = make_snapshot(&mixed_mempool());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mempool.bin");
    std::fs::write(&path, snapshot::encode(&snap)).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let (decoded, _) = snapshot::decode(&bytes).unwrap();

    let projector = Projector::new(ProjectorConfig::default());
    let template = projector.project(decoded).await.unwrap();
    assert_eq!(flatten(&template), vec![1, 3, 4, 5, 2, 0]);
    assert_eq!(projector.current(), Some(template));
}

// ======================================================================
// Txid-derived tie break
// ======================================================================

#[test]
fn txid_ordering_breaks_feerate_ties() {
    // Three identical transactions; only their txids differ. The tie break
    // uses the trailing four txid bytes as a little-endian key, lowest
    // selected first.
    let mut snap = make_snapshot(&[
        (0, 400.0, 400, 0, vec![]),
        (1, 400.0, 400, 0, vec![]),
        (2, 400.0, 400, 0, vec![]),
    ]);

    let txid = |last4: [u8; 4]| {
        let mut bytes = [0u8; 32];
        bytes[28..].copy_from_slice(&last4);
        Txid(bytes)
    };
    let mut ordering = HashMap::new();
    ordering.insert(0, txid([3, 0, 0, 0]));
    ordering.insert(1, txid([1, 0, 0, 0]));
    ordering.insert(2, txid([2, 0, 0, 0]));
    snap.apply_ordering(&ordering);

    let template = project(&snap, &BuildOptions::default());
    assert_eq!(flatten(&template), vec![1, 2, 0]);
}
