//! Greedy package-atomic block packing.
//!
//! Mirrors the transaction selection rule of Bitcoin Core's
//! `BlockAssembler`: repeatedly take the highest-scoring ancestor package,
//! commit it whole into the current simulated block (parents before
//! children), and open a new block when the best remaining candidate cannot
//! fit. Candidates live in two places: a stack sorted by ascending score
//! (best on top) for untouched transactions, and a max-heap for
//! transactions whose package shrank when an ancestor was committed.
//! Heap entries are never updated in place; stale ones are skipped lazily
//! by comparing their recorded score against the pool.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use tracing::{debug, info, trace, warn};

use scry_core::constants::{
    BLOCK_RESERVED_SIGOPS, BLOCK_RESERVED_WEIGHT, DEFAULT_PROJECTED_BLOCKS, MAX_BLOCK_SIGOPS,
    MAX_BLOCK_WEIGHT,
};
use scry_core::error::BuildError;
use scry_core::types::Snapshot;

use crate::audit::{cmp_by_score, AuditPool};
use crate::graph;

/// Consecutive fit failures tolerated before a nearly-full block is closed.
const PACKAGE_FAILURE_LIMIT: u32 = 1_000;

/// Cancellation is polled every `CANCEL_CHECK_INTERVAL` selection steps.
const CANCEL_CHECK_INTERVAL: u64 = 1_024;

/// Capacity limits for one projection run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// Weight ceiling per simulated block, in WU.
    pub max_block_weight: u32,
    /// Sigop-cost ceiling per simulated block.
    pub max_block_sigops: u32,
    /// Number of simulated blocks; the last one is unbounded and absorbs
    /// the remainder. Clamped to at least one.
    pub max_blocks: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_block_weight: MAX_BLOCK_WEIGHT,
            max_block_sigops: MAX_BLOCK_SIGOPS,
            max_blocks: DEFAULT_PROJECTED_BLOCKS,
        }
    }
}

/// Shared flag to abort an in-flight run. Cheap to clone; the builder polls
/// it between selection steps.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the running build returns
    /// [`BuildError::Cancelled`] at its next poll.
    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// Raw output of one build: per-block uid sequences in commit order plus
/// running totals, before formatting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildResult {
    /// Committed uids per simulated block, parents before children.
    pub blocks: Vec<Vec<u32>>,
    /// Total weight per block, including the coinbase reserve. `u64`: the
    /// unbounded final block can outgrow `u32` weight.
    pub block_weights: Vec<u64>,
    /// Total fees per block, in satoshis.
    pub block_fees: Vec<u64>,
    /// Ancestor packages larger than one tx, in committed order.
    pub clusters: Vec<Vec<u32>>,
    /// Uids whose effective fee rate changed, with the new rate, in
    /// snapshot order.
    pub rates: Vec<(u32, f64)>,
}

/// A scored entry in the modified-package heap.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    uid: u32,
    order: u32,
    score: f64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid && self.score == other.score
    }
}
impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        cmp_by_score((self.uid, self.order, self.score), (other.uid, other.order, other.score))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Scores come from the audit pool, which never produces NaN.
        self.partial_cmp(other).expect("candidate score is never NaN")
    }
}

/// Partition a snapshot into simulated blocks.
///
/// Pure with respect to the snapshot; all working state is owned by this
/// call and dropped afterwards. Deterministic: identical snapshots produce
/// identical results, including tie-break order.
///
/// # Errors
///
/// Returns [`BuildError::Cancelled`] if `cancel` was raised mid-run.
pub fn build(
    snapshot: &Snapshot,
    options: &BuildOptions,
    cancel: &CancelFlag,
) -> Result<BuildResult, BuildError> {
    let horizon = options.max_blocks.max(1);
    let mempool_len = snapshot.len();
    debug!("building template: {mempool_len} txs, horizon {horizon} blocks");

    let (mut pool, uids) = graph::init_pool(snapshot);
    graph::link_relatives(&mut pool, &uids);

    // Sort ascending by score so the best candidate sits on top.
    let mut stack: Vec<Candidate> = uids
        .iter()
        .map(|&uid| {
            let tx = pool[uid as usize]
                .as_ref()
                .expect("init_pool inserted every snapshot uid");
            Candidate { uid, order: tx.order(), score: tx.score() }
        })
        .collect();
    stack.sort_unstable_by(|a, b| a.cmp(b));
    let mut stack: Vec<u32> = stack.into_iter().map(|c| c.uid).collect();

    let per_block_capacity = 4_096.min(mempool_len.max(1));
    let mut blocks: Vec<Vec<u32>> = Vec::new();
    let mut block_weights: Vec<u64> = Vec::new();
    let mut block_fees: Vec<u64> = Vec::new();
    let mut clusters: Vec<Vec<u32>> = Vec::new();

    let mut transactions: Vec<u32> = Vec::with_capacity(per_block_capacity);
    let mut block_weight: u64 = u64::from(BLOCK_RESERVED_WEIGHT);
    let mut block_sigops: u64 = u64::from(BLOCK_RESERVED_SIGOPS);
    let mut block_fee: u64 = 0;

    let mut modified: BinaryHeap<Candidate> = BinaryHeap::with_capacity(mempool_len);
    let mut overflow: Vec<u32> = Vec::new();
    let mut failures: u32 = 0;
    let mut steps: u64 = 0;

    while !stack.is_empty() || !modified.is_empty() {
        steps += 1;
        if steps % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            info!("projection run cancelled after {steps} steps");
            return Err(BuildError::Cancelled);
        }

        let from_stack = next_valid_from_stack(&mut stack, &pool);
        let from_queue = next_valid_from_queue(&mut modified, &pool);
        let next_uid = match (from_stack, from_queue) {
            (None, None) => None,
            (Some(s), None) => {
                stack.pop();
                Some(s)
            }
            (None, Some(q)) => {
                modified.pop();
                Some(q)
            }
            (Some(s), Some(q)) => {
                if cmp_candidates(&pool, q, s) == Ordering::Less {
                    stack.pop();
                    Some(s)
                } else {
                    modified.pop();
                    Some(q)
                }
            }
        };

        if let Some(uid) = next_uid {
            let (package_vsize, package_sigops) = {
                let tx = pool[uid as usize]
                    .as_ref()
                    .expect("candidate uids always resolve in the pool");
                (tx.package_vsize(), tx.package_sigops())
            };

            let capacity_bound = blocks.len() < horizon - 1;
            if capacity_bound
                && (block_weight + 4 * package_vsize
                    >= u64::from(options.max_block_weight - BLOCK_RESERVED_WEIGHT)
                    || block_sigops + package_sigops > u64::from(options.max_block_sigops))
            {
                // Hold the package for a later block while smaller
                // candidates are tried against this one.
                overflow.push(uid);
                failures += 1;
            } else {
                commit_package(
                    uid,
                    &mut pool,
                    &mut modified,
                    &mut transactions,
                    &mut clusters,
                    &mut block_weight,
                    &mut block_sigops,
                    &mut block_fee,
                );
                failures = 0;
            }
        }

        let exceeded_package_tries = failures > PACKAGE_FAILURE_LIMIT
            && block_weight
                > u64::from(options.max_block_weight) - 2 * u64::from(BLOCK_RESERVED_WEIGHT);
        let sources_empty = stack.is_empty() && modified.is_empty();
        if (exceeded_package_tries || sources_empty) && blocks.len() < horizon - 1 {
            if transactions.is_empty() {
                // Nothing fits the bounded horizon at all; flush the rest
                // below instead of emitting empty blocks.
                break;
            }
            trace!(
                "closing block {}: {} txs, {} WU",
                blocks.len(),
                transactions.len(),
                block_weight
            );
            blocks.push(transactions);
            block_weights.push(block_weight);
            block_fees.push(block_fee);

            transactions = Vec::with_capacity(per_block_capacity);
            block_weight = u64::from(BLOCK_RESERVED_WEIGHT);
            block_sigops = u64::from(BLOCK_RESERVED_SIGOPS);
            block_fee = 0;
            failures = 0;

            // Overflowed packages are first-class candidates for the next
            // block; reverse so the best-scored land back on top.
            overflow.reverse();
            for &overflowed in &overflow {
                if let Some(Some(tx)) = pool.get(overflowed as usize) {
                    if tx.modified {
                        modified.push(Candidate {
                            uid: overflowed,
                            order: tx.order(),
                            score: tx.score(),
                        });
                    } else {
                        stack.push(overflowed);
                    }
                }
            }
            overflow.clear();
        }
    }

    // Candidates too large for any bounded block end up here; they still
    // belong to the partition and flush into the final block.
    if !overflow.is_empty() {
        warn!("{} packages never fit a bounded block; flushing", overflow.len());
        for &uid in &overflow {
            if let Some(Some(tx)) = pool.get(uid as usize) {
                if tx.committed {
                    continue;
                }
            }
            commit_package(
                uid,
                &mut pool,
                &mut modified,
                &mut transactions,
                &mut clusters,
                &mut block_weight,
                &mut block_sigops,
                &mut block_fee,
            );
        }
    }

    if !transactions.is_empty() {
        blocks.push(transactions);
        block_weights.push(block_weight);
        block_fees.push(block_fee);
    }

    // Surface effective-rate changes in deterministic snapshot order.
    let mut rates: Vec<(u32, f64)> = Vec::new();
    for tx in snapshot.iter() {
        if let Some(Some(audit_tx)) = pool.get(tx.uid as usize) {
            if audit_tx.dirty {
                rates.push((audit_tx.uid, audit_tx.effective_feerate));
            }
        }
    }

    info!(
        "template built: {} blocks, {} txs, {} rate updates",
        blocks.len(),
        blocks.iter().map(Vec::len).sum::<usize>(),
        rates.len()
    );
    Ok(BuildResult { blocks, block_weights, block_fees, clusters, rates })
}

/// Compare two live candidates through their current pool state.
fn cmp_candidates(pool: &AuditPool, a: u32, b: u32) -> Ordering {
    let key = |uid: u32| {
        let tx = pool[uid as usize]
            .as_ref()
            .expect("live candidates always resolve in the pool");
        (uid, tx.order(), tx.score())
    };
    cmp_by_score(key(a), key(b)).expect("pool scores are never NaN")
}

/// Commit `uid`'s whole ancestor package into the current block, parents
/// first, and shrink the packages of every remaining descendant.
#[allow(clippy::too_many_arguments)]
fn commit_package(
    uid: u32,
    pool: &mut AuditPool,
    modified: &mut BinaryHeap<Candidate>,
    transactions: &mut Vec<u32>,
    clusters: &mut Vec<Vec<u32>>,
    block_weight: &mut u64,
    block_sigops: &mut u64,
    block_fee: &mut u64,
) {
    let (ancestors, cluster_rate): (Vec<u32>, f64) = {
        let tx = pool[uid as usize]
            .as_ref()
            .expect("committed uids always resolve in the pool");
        (tx.ancestors.iter().copied().collect(), tx.cluster_rate())
    };

    // Order the package so parents always precede children: ascending
    // ancestor count, then the deterministic tie-break keys.
    let mut package: Vec<(u32, u32, usize)> = Vec::with_capacity(ancestors.len() + 1);
    for ancestor in ancestors {
        if let Some(Some(ancestor_tx)) = pool.get(ancestor as usize) {
            package.push((ancestor, ancestor_tx.order(), ancestor_tx.ancestors.len()));
        }
    }
    package.sort_unstable_by(|a, b| {
        if a.2 != b.2 {
            a.2.cmp(&b.2)
        } else if a.1 != b.1 {
            a.1.cmp(&b.1)
        } else {
            a.0.cmp(&b.0)
        }
    });
    let is_cluster = !package.is_empty();
    {
        let tx = pool[uid as usize].as_ref().expect("checked above");
        package.push((uid, tx.order(), tx.ancestors.len()));
    }

    let mut cluster: Vec<u32> = Vec::with_capacity(package.len());
    for &(member, _, _) in &package {
        cluster.push(member);
        if let Some(Some(tx)) = pool.get_mut(member as usize) {
            tx.committed = true;
            tx.set_dirty_if_different(cluster_rate);
            transactions.push(tx.uid);
            *block_weight += u64::from(tx.weight);
            *block_sigops += u64::from(tx.sigops);
            *block_fee += tx.fee;
        }
        shrink_descendants(member, pool, modified, cluster_rate);
    }
    if is_cluster {
        clusters.push(cluster);
    }
}

/// Peek the best still-valid uid on the sorted stack, discarding entries
/// that were committed or moved to the modified heap.
fn next_valid_from_stack(stack: &mut Vec<u32>, pool: &AuditPool) -> Option<u32> {
    while let Some(&uid) = stack.last() {
        match pool.get(uid as usize) {
            Some(Some(tx)) if !tx.committed && !tx.modified => return Some(uid),
            _ => {
                stack.pop();
            }
        }
    }
    None
}

/// Peek the best still-valid uid in the modified heap, discarding committed
/// and stale entries (score no longer matching the pool).
fn next_valid_from_queue(queue: &mut BinaryHeap<Candidate>, pool: &AuditPool) -> Option<u32> {
    while let Some(entry) = queue.peek() {
        match pool.get(entry.uid as usize) {
            Some(Some(tx)) if !tx.committed && tx.score() == entry.score => return Some(entry.uid),
            _ => {
                queue.pop();
            }
        }
    }
    None
}

/// Walk the remaining descendants of a freshly committed transaction,
/// removing it from their ancestor packages and requeueing any whose score
/// changed. This bounds recomputation to the affected subgraph.
fn shrink_descendants(
    root: u32,
    pool: &mut AuditPool,
    modified: &mut BinaryHeap<Candidate>,
    cluster_rate: f64,
) {
    let mut visited: HashSet<u32> = HashSet::new();
    let mut descendants: Vec<u32> = Vec::new();
    let (root_fee, root_adjusted_weight, root_adjusted_vsize, root_sigops) =
        match pool.get(root as usize) {
            Some(Some(root_tx)) => {
                for &child in &root_tx.children {
                    if visited.insert(child) {
                        descendants.push(child);
                    }
                }
                (root_tx.fee, root_tx.adjusted_weight, root_tx.adjusted_vsize, root_tx.sigops)
            }
            _ => return,
        };

    while let Some(uid) = descendants.pop() {
        if let Some(Some(descendant)) = pool.get_mut(uid as usize) {
            let old_score = descendant.remove_committed_ancestor(
                root,
                root_fee,
                root_adjusted_weight,
                root_adjusted_vsize,
                root_sigops,
                cluster_rate,
            );
            if descendant.score() != old_score {
                descendant.modified = true;
                modified.push(Candidate {
                    uid,
                    order: descendant.order(),
                    score: descendant.score(),
                });
            }
            for &child in &descendant.children {
                if visited.insert(child) {
                    descendants.push(child);
                }
            }
        }
    }
}
