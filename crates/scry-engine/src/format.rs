//! Shapes a raw [`BuildResult`] into the published [`BlockTemplate`].
//!
//! The formatter is read-only over the snapshot: it looks up per-tx
//! effective fee rates (post-selection, so CPFP lifts are visible), samples
//! a fee range per block, and derives the median from that range. Sample
//! length is 8 for the next block and shrinks for deeper blocks, where
//! consumers only render a coarse gradient.

use std::collections::HashMap;

use scry_core::constants::{BASE_FEE_RANGE, FIRST_BLOCK_FEE_RANGE};
use scry_core::template::{BlockStats, BlockTemplate, TemplateBlock};
use scry_core::types::Snapshot;

use crate::builder::BuildResult;

/// Blocks holding more transactions than this sample coarsely; consumers
/// only render a rough gradient for them.
const LARGE_BLOCK_TXS: usize = 4_000;
const LARGE_BLOCK_RANGE: usize = 5;

/// Assemble the final template from a completed build.
pub fn format_template(snapshot: &Snapshot, result: &BuildResult) -> BlockTemplate {
    let updated: HashMap<u32, f64> = result.rates.iter().copied().collect();
    let rate_of = |uid: u32| -> f64 {
        updated.get(&uid).copied().or_else(|| {
            snapshot.get(uid).map(|tx| tx.effective_feerate)
        }).unwrap_or(0.0)
    };

    let mut blocks = Vec::with_capacity(result.blocks.len());
    for (index, uids) in result.blocks.iter().enumerate() {
        let rates: Vec<f64> = uids.iter().map(|&uid| rate_of(uid)).collect();
        let fee_range = fees_in_range(&rates, range_length(index, uids.len()));
        let median_fee = if fee_range.is_empty() { 0.0 } else { fee_range[fee_range.len() / 2] };
        blocks.push(TemplateBlock {
            uids: uids.clone(),
            stats: BlockStats {
                weight: result.block_weights.get(index).copied().unwrap_or(0),
                tx_count: uids.len(),
                fee_total: result.block_fees.get(index).copied().unwrap_or(0),
                fee_range,
                median_fee,
            },
        });
    }

    BlockTemplate { blocks, clusters: result.clusters.clone(), rates: result.rates.clone() }
}

fn range_length(block_index: usize, tx_count: usize) -> usize {
    let mut len = if block_index == 0 { FIRST_BLOCK_FEE_RANGE } else { BASE_FEE_RANGE };
    if tx_count > LARGE_BLOCK_TXS {
        len = LARGE_BLOCK_RANGE;
    }
    len
}

/// Sample an ascending fee range from per-tx rates in commit order.
///
/// Commit order is non-increasing apart from CPFP seams, so rates that rise
/// against the previous accepted value are anomalies and skipped, keeping
/// the sample monotonic. The sample is min, interior points at evenly
/// spaced fractions of the filtered list, then max.
fn fees_in_range(rates_in_commit_order: &[f64], range_length: usize) -> Vec<f64> {
    if rates_in_commit_order.is_empty() || range_length < 2 {
        return Vec::new();
    }

    let mut filtered: Vec<f64> = Vec::with_capacity(rates_in_commit_order.len());
    let mut last_valid = f64::INFINITY;
    for &rate in rates_in_commit_order {
        if rate <= last_valid {
            filtered.push(rate);
            last_valid = rate;
        }
    }

    let len = filtered.len();
    let mut range = Vec::with_capacity(range_length);
    range.push(filtered[len - 1]);
    let chunk = 1.0 / (range_length as f64 - 1.0);
    for step in (1..range_length - 1).rev() {
        let index = (len as f64 * chunk * step as f64).floor() as usize;
        range.push(filtered[index.min(len - 1)]);
    }
    range.push(filtered[0]);
    range
}
