//! Consensus capacity constants and projection defaults.
//! All fee values are in satoshis, all sizes in weight units (WU).

/// Maximum block weight in weight units (consensus ceiling).
pub const MAX_BLOCK_WEIGHT: u32 = 4_000_000;

/// Maximum signature-operation cost per block (consensus ceiling).
pub const MAX_BLOCK_SIGOPS: u32 = 80_000;

/// Weight reserved at the start of every simulated block for the coinbase
/// transaction, which the projection never selects.
pub const BLOCK_RESERVED_WEIGHT: u32 = 4_000;

/// Sigop cost reserved for the coinbase transaction.
pub const BLOCK_RESERVED_SIGOPS: u32 = 400;

/// Number of simulated blocks to project. The last block is unbounded and
/// absorbs everything beyond the display horizon.
pub const DEFAULT_PROJECTED_BLOCKS: usize = 8;

/// Refuse projection runs over snapshots larger than this many transactions.
pub const DEFAULT_MAX_SNAPSHOT_TXS: usize = 500_000;

/// Wall-clock budget for a single projection run, in milliseconds.
pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 60_000;

/// Fee-range sample length for the first projected block.
pub const FIRST_BLOCK_FEE_RANGE: usize = 8;

/// Fee-range sample length for later projected blocks (scaled up with
/// transaction count, see `scry-engine`'s formatter).
pub const BASE_FEE_RANGE: usize = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_fit_inside_ceilings() {
        assert!(BLOCK_RESERVED_WEIGHT < MAX_BLOCK_WEIGHT);
        assert!(BLOCK_RESERVED_SIGOPS < MAX_BLOCK_SIGOPS);
    }

    #[test]
    fn at_least_two_projected_blocks() {
        // The horizon must leave room for one bounded block plus the
        // unbounded overflow block.
        assert!(DEFAULT_PROJECTED_BLOCKS >= 2);
    }
}
