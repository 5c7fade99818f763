//! Shared test helpers for E2E and property tests.

use scry_core::template::BlockTemplate;
use scry_core::types::{Snapshot, SnapshotTx};
use scry_engine::{build, format_template, BuildOptions, CancelFlag};

/// One transaction spec: `(uid, fee_sats, weight, sigops, parents)`.
pub type TxSpec = (u32, f64, u32, u32, Vec<u32>);

/// Build a snapshot from specs. The order key defaults to the uid.
pub fn make_snapshot(specs: &[TxSpec]) -> Snapshot {
    let max_uid = specs.iter().map(|s| s.0).max().unwrap_or(0);
    make_snapshot_with_max_uid(specs, max_uid)
}

/// Build a snapshot with an explicit uid range, for orphan-edge scenarios.
pub fn make_snapshot_with_max_uid(specs: &[TxSpec], max_uid: u32) -> Snapshot {
    let mut snap = Snapshot::new(max_uid);
    for (uid, fee, weight, sigops, parents) in specs {
        snap.insert(SnapshotTx {
            uid: *uid,
            order: *uid,
            fee: *fee,
            weight: *weight,
            sigops: *sigops,
            effective_feerate: fee / (f64::from(*weight) / 4.0),
            parents: parents.clone(),
        })
        .expect("test spec is a valid record");
    }
    snap
}

/// Run the whole engine pipeline over a snapshot.
pub fn project(snapshot: &Snapshot, options: &BuildOptions) -> BlockTemplate {
    let result = build(snapshot, options, &CancelFlag::new()).expect("build is not cancelled");
    format_template(snapshot, &result)
}

/// All committed uids across all blocks, in global commit order.
pub fn flatten(template: &BlockTemplate) -> Vec<u32> {
    template.blocks.iter().flat_map(|b| b.uids.iter().copied()).collect()
}

/// Assert every parent edge is committed before its child.
pub fn assert_dependency_order(snapshot: &Snapshot, template: &BlockTemplate) {
    let flat = flatten(template);
    let position = |uid: u32| {
        flat.iter()
            .position(|&u| u == uid)
            .unwrap_or_else(|| panic!("uid {uid} missing from template"))
    };
    for tx in snapshot.iter() {
        for &parent in &tx.parents {
            if snapshot.contains(parent) {
                assert!(
                    position(parent) < position(tx.uid),
                    "parent {parent} committed after child {}",
                    tx.uid
                );
            }
        }
    }
}

/// Assert every snapshot uid appears exactly once across the blocks.
pub fn assert_partition_complete(snapshot: &Snapshot, template: &BlockTemplate) {
    let mut flat = flatten(template);
    flat.sort_unstable();
    let mut expected: Vec<u32> = snapshot.iter().map(|tx| tx.uid).collect();
    expected.sort_unstable();
    assert_eq!(flat, expected, "template is not a partition of the snapshot");
}

/// Assert every block except the last respects the weight and sigop
/// ceilings.
pub fn assert_capacity(snapshot: &Snapshot, template: &BlockTemplate, options: &BuildOptions) {
    for (index, block) in template.blocks.iter().enumerate() {
        if index + 1 == template.blocks.len() {
            continue;
        }
        assert!(
            block.stats.weight <= u64::from(options.max_block_weight),
            "block {index} exceeds weight ceiling: {}",
            block.stats.weight
        );
        let sigops: u32 = block
            .uids
            .iter()
            .map(|&uid| snapshot.get(uid).map_or(0, |tx| tx.sigops))
            .sum();
        assert!(
            sigops <= options.max_block_sigops,
            "block {index} exceeds sigop ceiling: {sigops}"
        );
    }
}
