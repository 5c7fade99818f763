//! Per-transaction selection state: sigop-adjusted sizes, ancestor-package
//! aggregates, and the mining score used to rank candidates.
//!
//! Package aggregates (`package_fee`, `package_adjusted_weight`, ...) are
//! accumulated with exact integer arithmetic; floating point only appears in
//! the final fee-rate ratios used for comparison, so repeated updates never
//! drift the selection order. Aggregates are `u64`: per-tx sizes are
//! bounded by the block ceiling at snapshot insertion, but a long chain of
//! near-ceiling transactions can sum past `u32::MAX`.

use std::cmp::Ordering;
use std::collections::HashSet;

use scry_core::types::SnapshotTx;

/// Working arena for one projection run, indexed by dense uid.
pub(crate) type AuditPool = Vec<Option<AuditTx>>;

/// Compare two `(uid, order, score)` keys.
///
/// Sorts by ascending score; ties break by descending `order` key, then
/// descending uid. Candidates are taken from the high end of this ordering,
/// so among equal scores the transaction with the lowest order key is
/// selected first. Returns `None` only if a score is NaN, which
/// [`AuditTx`] construction rules out.
#[inline]
pub(crate) fn cmp_by_score(a: (u32, u32, f64), b: (u32, u32, f64)) -> Option<Ordering> {
    if a.2 != b.2 {
        a.2.partial_cmp(&b.2)
    } else if a.1 != b.1 {
        Some(b.1.cmp(&a.1))
    } else {
        Some(b.0.cmp(&a.0))
    }
}

#[inline]
fn fee_rate(fee: u64, vsize: f64) -> f64 {
    (fee as f64) / (if vsize == 0.0 { 1.0 } else { vsize })
}

/// One transaction's selection state inside the audit pool.
#[derive(Clone, Debug)]
pub(crate) struct AuditTx {
    pub uid: u32,
    order: u32,
    /// Fee in satoshis (integer; the snapshot's f64 is truncated once here).
    pub fee: u64,
    pub weight: u32,
    /// `max(weight, 20 * sigops)`: weight with the sigop cost folded in.
    pub adjusted_weight: u32,
    /// `max(ceil(weight / 4), 5 * sigops)`: vsize with sigop cost, rounded up.
    pub adjusted_vsize: u32,
    pub sigops: u32,
    /// Individual fee rate over adjusted vsize.
    feerate: f64,
    /// Effective rate published to consumers; starts from the producer's
    /// advisory value and is overwritten with the committed cluster rate.
    pub effective_feerate: f64,
    /// Lowest cluster rate of any committed ancestor package this tx
    /// depended on; caps the effective rate of CPFP descendants.
    pub dependency_rate: f64,
    /// Declared in-mempool parent uids.
    pub parents: Vec<u32>,
    /// Whether the relatives graph pass has resolved this tx.
    pub relatives_set: bool,
    /// Not-yet-committed unconfirmed ancestors.
    pub ancestors: HashSet<u32>,
    pub children: HashSet<u32>,
    package_fee: u64,
    package_adjusted_weight: u64,
    package_adjusted_vsize: u64,
    package_sigops: u64,
    // Private so no caller can make it NaN and break the ordering.
    score: f64,
    /// Committed to a simulated block (terminal state).
    pub committed: bool,
    /// Present in the modified priority queue rather than the sorted stack.
    pub modified: bool,
    /// Effective fee rate changed since the snapshot was taken.
    pub dirty: bool,
}

impl AuditTx {
    pub fn from_snapshot_tx(tx: &SnapshotTx) -> Self {
        let fee = tx.fee as u64;
        let adjusted_vsize = tx.weight.div_ceil(4).max(tx.sigops * 5);
        let adjusted_weight = tx.weight.max(tx.sigops * 20);
        // If the sigop cost dominates, the producer's advisory rate was
        // computed over the wrong denominator; recompute it.
        let sigop_bound = tx.weight < tx.sigops * 20;
        let effective_feerate = if sigop_bound {
            fee_rate(fee, f64::from(adjusted_weight) / 4.0)
        } else {
            tx.effective_feerate
        };
        Self {
            uid: tx.uid,
            order: tx.order,
            fee,
            weight: tx.weight,
            adjusted_weight,
            adjusted_vsize,
            sigops: tx.sigops,
            feerate: fee_rate(fee, f64::from(adjusted_vsize)),
            effective_feerate,
            dependency_rate: f64::INFINITY,
            parents: tx.parents.clone(),
            relatives_set: false,
            ancestors: HashSet::new(),
            children: HashSet::new(),
            package_fee: fee,
            package_adjusted_weight: u64::from(adjusted_weight),
            package_adjusted_vsize: u64::from(adjusted_vsize),
            package_sigops: u64::from(tx.sigops),
            score: 0.0,
            committed: false,
            modified: false,
            dirty: effective_feerate != tx.effective_feerate,
        }
    }

    #[inline]
    pub const fn score(&self) -> f64 {
        self.score
    }

    #[inline]
    pub const fn order(&self) -> u32 {
        self.order
    }

    #[inline]
    pub const fn package_vsize(&self) -> u64 {
        self.package_adjusted_vsize
    }

    #[inline]
    pub const fn package_sigops(&self) -> u64 {
        self.package_sigops
    }

    /// Effective rate of this package if committed now: the package fee rate
    /// over adjusted weight, capped by the rate of any committed ancestor
    /// cluster.
    #[inline]
    pub fn cluster_rate(&self) -> f64 {
        self.dependency_rate
            .min(fee_rate(self.package_fee, self.package_adjusted_weight as f64 / 4.0))
    }

    pub fn set_dirty_if_different(&mut self, cluster_rate: f64) {
        if self.effective_feerate != cluster_rate {
            self.effective_feerate = cluster_rate;
            self.dirty = true;
        }
    }

    /// Recompute the mining score: the individual fee rate capped by the
    /// package fee rate (a cheap child cannot ride a rich ancestor, and an
    /// expensive child pays for its ancestors). Never produces NaN: both
    /// denominators are at least 1.
    #[inline]
    fn recompute_score(&mut self) {
        self.score = self
            .feerate
            .min(fee_rate(self.package_fee, self.package_adjusted_vsize as f64));
    }

    /// Install the resolved ancestor set and the aggregates summed over it
    /// (excluding this tx; its own contribution is added here).
    pub fn set_ancestors(
        &mut self,
        ancestors: HashSet<u32>,
        total_fee: u64,
        total_adjusted_weight: u64,
        total_adjusted_vsize: u64,
        total_sigops: u64,
    ) {
        self.ancestors = ancestors;
        self.package_fee = self.fee + total_fee;
        self.package_adjusted_weight = u64::from(self.adjusted_weight) + total_adjusted_weight;
        self.package_adjusted_vsize = u64::from(self.adjusted_vsize) + total_adjusted_vsize;
        self.package_sigops = u64::from(self.sigops) + total_sigops;
        self.recompute_score();
        self.relatives_set = true;
    }

    /// Remove a committed ancestor from this package, shrinking the
    /// aggregates, and note the cluster rate it was committed at. Returns
    /// the score before the update.
    pub fn remove_committed_ancestor(
        &mut self,
        ancestor_uid: u32,
        ancestor_fee: u64,
        ancestor_adjusted_weight: u32,
        ancestor_adjusted_vsize: u32,
        ancestor_sigops: u32,
        cluster_rate: f64,
    ) -> f64 {
        let old_score = self.score;
        self.dependency_rate = self.dependency_rate.min(cluster_rate);
        if self.ancestors.remove(&ancestor_uid) {
            self.package_fee -= ancestor_fee;
            self.package_adjusted_weight -= u64::from(ancestor_adjusted_weight);
            self.package_adjusted_vsize -= u64::from(ancestor_adjusted_vsize);
            self.package_sigops -= u64::from(ancestor_sigops);
            self.recompute_score();
        }
        old_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_tx(uid: u32, fee: f64, weight: u32, sigops: u32) -> SnapshotTx {
        SnapshotTx {
            uid,
            order: uid,
            fee,
            weight,
            sigops,
            effective_feerate: fee / (f64::from(weight) / 4.0),
            parents: vec![],
        }
    }

    // ------------------------------------------------------------------
    // Sigop adjustment
    // ------------------------------------------------------------------

    #[test]
    fn adjusted_sizes_weight_bound() {
        // 1000 WU, 2 sigops: weight dominates.
        let tx = AuditTx::from_snapshot_tx(&snapshot_tx(1, 1_000.0, 1_000, 2));
        assert_eq!(tx.adjusted_vsize, 250);
        assert_eq!(tx.adjusted_weight, 1_000);
        assert!(!tx.dirty);
    }

    #[test]
    fn adjusted_sizes_sigop_bound() {
        // 100 WU but 50 sigops: sigop cost dominates and the advisory rate
        // is recomputed (tx becomes dirty).
        let tx = AuditTx::from_snapshot_tx(&snapshot_tx(1, 1_000.0, 100, 50));
        assert_eq!(tx.adjusted_vsize, 250);
        assert_eq!(tx.adjusted_weight, 1_000);
        assert!(tx.dirty);
        assert_eq!(tx.effective_feerate, 1_000.0 / 250.0);
    }

    #[test]
    fn vsize_rounds_up() {
        let tx = AuditTx::from_snapshot_tx(&snapshot_tx(1, 10.0, 5, 0));
        assert_eq!(tx.adjusted_vsize, 2);
    }

    // ------------------------------------------------------------------
    // Score
    // ------------------------------------------------------------------

    #[test]
    fn lone_tx_score_is_own_feerate() {
        let mut tx = AuditTx::from_snapshot_tx(&snapshot_tx(1, 500.0, 400, 0));
        tx.set_ancestors(HashSet::new(), 0, 0, 0, 0);
        assert_eq!(tx.score(), 5.0);
    }

    #[test]
    fn score_capped_by_poor_ancestor() {
        // Child at 10 sat/vB with a 1 sat/vB parent of equal size: the
        // package rate (5.5) caps nothing, the child's own rate is 10, so
        // score = min(10, 5.5) = 5.5.
        let mut child = AuditTx::from_snapshot_tx(&snapshot_tx(2, 1_000.0, 400, 0));
        let mut parents = HashSet::new();
        parents.insert(1);
        child.set_ancestors(parents, 100, 400, 100, 0);
        assert_eq!(child.score(), 1_100.0 / 200.0);
    }

    #[test]
    fn rich_child_score_stays_own_rate_floor() {
        // Package rate above the child's own rate: score is the child's rate.
        let mut child = AuditTx::from_snapshot_tx(&snapshot_tx(2, 100.0, 400, 0));
        let mut parents = HashSet::new();
        parents.insert(1);
        child.set_ancestors(parents, 10_000, 400, 100, 0);
        assert_eq!(child.score(), 1.0);
    }

    #[test]
    fn package_aggregates_hold_past_u32_range() {
        // A chain of ceiling-weight ancestors can sum past u32::MAX; the
        // aggregates must carry that without wrapping.
        let mut child = AuditTx::from_snapshot_tx(&snapshot_tx(2, 1_000.0, 4_000_000, 0));
        let mut parents = HashSet::new();
        parents.insert(1);
        child.set_ancestors(parents, 2_000, 8_000_000_000, 2_000_000_000, 100_000);
        assert_eq!(child.package_vsize(), 2_001_000_000);
        assert!(child.score() > 0.0);
        assert!(child.cluster_rate().is_finite());
    }

    #[test]
    fn remove_committed_ancestor_shrinks_package() {
        let mut child = AuditTx::from_snapshot_tx(&snapshot_tx(2, 1_000.0, 400, 0));
        let mut parents = HashSet::new();
        parents.insert(1);
        child.set_ancestors(parents, 100, 400, 100, 0);
        let old = child.remove_committed_ancestor(1, 100, 400, 100, 0, 5.5);
        assert_eq!(old, 5.5);
        // Back to a lone package: own rate.
        assert_eq!(child.score(), 10.0);
        assert_eq!(child.dependency_rate, 5.5);
        assert!(child.ancestors.is_empty());
    }

    #[test]
    fn remove_unknown_ancestor_only_updates_dependency_rate() {
        let mut tx = AuditTx::from_snapshot_tx(&snapshot_tx(2, 1_000.0, 400, 0));
        tx.set_ancestors(HashSet::new(), 0, 0, 0, 0);
        let before = tx.score();
        tx.remove_committed_ancestor(9, 100, 400, 100, 0, 2.0);
        assert_eq!(tx.score(), before);
        assert_eq!(tx.dependency_rate, 2.0);
    }

    // ------------------------------------------------------------------
    // Tie-break ordering
    // ------------------------------------------------------------------

    #[test]
    fn orders_by_score_first() {
        assert_eq!(cmp_by_score((1, 1, 2.0), (2, 2, 3.0)), Some(Ordering::Less));
        assert_eq!(cmp_by_score((1, 1, 3.0), (2, 2, 2.0)), Some(Ordering::Greater));
    }

    #[test]
    fn equal_scores_break_by_descending_order_key() {
        // Lower order key sorts later (is selected first from the high end).
        assert_eq!(cmp_by_score((1, 5, 2.0), (2, 9, 2.0)), Some(Ordering::Greater));
        assert_eq!(cmp_by_score((1, 9, 2.0), (2, 5, 2.0)), Some(Ordering::Less));
    }

    #[test]
    fn full_ties_break_by_descending_uid() {
        assert_eq!(cmp_by_score((1, 5, 2.0), (2, 5, 2.0)), Some(Ordering::Greater));
        assert_eq!(cmp_by_score((2, 5, 2.0), (1, 5, 2.0)), Some(Ordering::Less));
    }

    #[test]
    fn nan_score_compares_as_none() {
        assert_eq!(cmp_by_score((1, 1, f64::NAN), (2, 2, 1.0)), None);
    }

    #[test]
    fn effective_rate_update_marks_dirty() {
        let mut tx = AuditTx::from_snapshot_tx(&snapshot_tx(1, 500.0, 400, 0));
        tx.set_dirty_if_different(tx.effective_feerate);
        assert!(!tx.dirty);
        tx.set_dirty_if_different(9.9);
        assert!(tx.dirty);
        assert_eq!(tx.effective_feerate, 9.9);
    }
}
