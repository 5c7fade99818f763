//! Relatives-graph construction: resolves every transaction's ancestor set
//! and package aggregates before the builder starts selecting.
//!
//! The traversal is an iterative depth-first pass over declared parent
//! edges, memoized through `relatives_set` so each transaction is resolved
//! once. Parent uids absent from the pool are orphan edges and are ignored.
//! The spend graph cannot legally contain cycles, but a corrupt snapshot
//! might: an edge that closes a cycle is dropped deterministically (in
//! declared-parent order) and logged, never followed.

use std::collections::HashSet;

use tracing::warn;

use scry_core::types::Snapshot;

use crate::audit::{AuditPool, AuditTx};

/// Build the audit-pool arena from a snapshot. Returns the pool (indexed by
/// uid, sized `max_uid + 1`) and the uids present, in snapshot order.
pub(crate) fn init_pool(snapshot: &Snapshot) -> (AuditPool, Vec<u32>) {
    let mut pool: AuditPool = vec![None; snapshot.max_uid() as usize + 1];
    let mut uids = Vec::with_capacity(snapshot.len());
    for tx in snapshot.iter() {
        pool[tx.uid as usize] = Some(AuditTx::from_snapshot_tx(tx));
        uids.push(tx.uid);
    }
    (pool, uids)
}

/// Resolve ancestor sets, child links, and package aggregates for every
/// transaction in the pool.
pub(crate) fn link_relatives(pool: &mut AuditPool, uids: &[u32]) {
    for &uid in uids {
        resolve(uid, pool);
    }
}

/// Resolve one transaction and, transitively, its unresolved ancestors.
fn resolve(root: u32, pool: &mut AuditPool) {
    match pool.get(root as usize) {
        Some(Some(tx)) if !tx.relatives_set => {}
        _ => return,
    }

    let mut stack: Vec<u32> = vec![root];
    let mut in_progress: HashSet<u32> = HashSet::new();

    while let Some(&uid) = stack.last() {
        let parents = match pool.get(uid as usize) {
            Some(Some(tx)) if !tx.relatives_set => tx.parents.clone(),
            _ => {
                stack.pop();
                continue;
            }
        };

        if in_progress.insert(uid) {
            // First visit: queue unresolved parents below this tx.
            for &parent in &parents {
                if in_progress.contains(&parent) {
                    warn!("spend-graph cycle at edge {uid} -> {parent}; dropping edge");
                    continue;
                }
                if let Some(Some(parent_tx)) = pool.get(parent as usize) {
                    if !parent_tx.relatives_set {
                        stack.push(parent);
                    }
                }
            }
        } else {
            // Second visit: every traversable parent is resolved.
            let mut ancestors: HashSet<u32> = HashSet::new();
            for &parent in &parents {
                if in_progress.contains(&parent) {
                    // Cycle edge, already logged on the way down.
                    continue;
                }
                if let Some(Some(parent_tx)) = pool.get_mut(parent as usize) {
                    ancestors.insert(parent);
                    parent_tx.children.insert(uid);
                    for &ancestor in &parent_tx.ancestors {
                        ancestors.insert(ancestor);
                    }
                }
            }

            let mut total_fee: u64 = 0;
            let mut total_adjusted_weight: u64 = 0;
            let mut total_adjusted_vsize: u64 = 0;
            let mut total_sigops: u64 = 0;
            for &ancestor in &ancestors {
                if let Some(Some(ancestor_tx)) = pool.get(ancestor as usize) {
                    total_fee += ancestor_tx.fee;
                    total_adjusted_weight += u64::from(ancestor_tx.adjusted_weight);
                    total_adjusted_vsize += u64::from(ancestor_tx.adjusted_vsize);
                    total_sigops += u64::from(ancestor_tx.sigops);
                }
            }

            if let Some(Some(tx)) = pool.get_mut(uid as usize) {
                tx.set_ancestors(
                    ancestors,
                    total_fee,
                    total_adjusted_weight,
                    total_adjusted_vsize,
                    total_sigops,
                );
            }
            in_progress.remove(&uid);
            stack.pop();
        }
    }
}
