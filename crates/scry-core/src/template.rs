//! Template output types: the externally consumed shape of a projection run.
//!
//! A [`BlockTemplate`] is built in one piece by a single run and published
//! atomically; it is replaced wholesale by the next completed run, never
//! patched.

use serde::{Deserialize, Serialize};

/// Aggregate statistics for one simulated block.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BlockStats {
    /// Total weight of committed transactions plus the coinbase reserve.
    /// `u64` because the final unbounded block can outgrow `u32` weight.
    pub weight: u64,
    /// Number of committed transactions.
    pub tx_count: usize,
    /// Total fees in satoshis.
    pub fee_total: u64,
    /// Fixed-size ascending sample of per-transaction effective fee rates
    /// (sat/vB): minimum, interior percentile points, maximum.
    pub fee_range: Vec<f64>,
    /// The fee-range value at its midpoint, matching consumers that index
    /// into `fee_range` by percentile.
    pub median_fee: f64,
}

/// One simulated block: uids in commit order plus aggregate stats.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TemplateBlock {
    /// Committed uids, parents always before their children.
    pub uids: Vec<u32>,
    /// Aggregate statistics.
    pub stats: BlockStats,
}

/// A complete projection: the ordered sequence of simulated blocks, plus the
/// CPFP side products consumers use to annotate individual transactions.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BlockTemplate {
    /// Simulated blocks in mining order. All blocks except the last respect
    /// the configured weight and sigop ceilings; the last absorbs the
    /// remainder beyond the projection horizon.
    pub blocks: Vec<TemplateBlock>,
    /// Ancestor packages larger than one transaction, in committed order.
    pub clusters: Vec<Vec<u32>>,
    /// Uids whose effective fee rate changed during selection, with the new
    /// rate (sat/vB).
    pub rates: Vec<(u32, f64)>,
}

impl BlockTemplate {
    /// Total number of transactions across all blocks.
    pub fn tx_count(&self) -> usize {
        self.blocks.iter().map(|b| b.uids.len()).sum()
    }
}
