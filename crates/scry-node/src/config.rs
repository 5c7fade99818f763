//! Projector configuration.
//!
//! Provides [`ProjectorConfig`] with defaults matching Bitcoin mainnet
//! consensus limits. The configuration can be customized programmatically,
//! e.g. for testnets with different block ceilings or for shorter
//! projection horizons.

use std::time::Duration;

use scry_core::constants::{
    DEFAULT_MAX_SNAPSHOT_TXS, DEFAULT_PROJECTED_BLOCKS, DEFAULT_RUN_TIMEOUT_MS, MAX_BLOCK_SIGOPS,
    MAX_BLOCK_WEIGHT,
};
use scry_engine::BuildOptions;

/// Configuration for a [`Projector`](crate::service::Projector) instance.
#[derive(Debug, Clone)]
pub struct ProjectorConfig {
    /// Weight ceiling per simulated block, in WU.
    pub max_block_weight: u32,
    /// Sigop-cost ceiling per simulated block.
    pub max_block_sigops: u32,
    /// Projection horizon: number of simulated blocks, the last unbounded.
    pub max_blocks: usize,
    /// Snapshots with more transactions than this are refused outright.
    pub max_snapshot_txs: usize,
    /// Wall-clock budget for one projection run; on expiry the run is
    /// cancelled and the previous template stays published.
    pub run_timeout: Duration,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            max_block_weight: MAX_BLOCK_WEIGHT,
            max_block_sigops: MAX_BLOCK_SIGOPS,
            max_blocks: DEFAULT_PROJECTED_BLOCKS,
            max_snapshot_txs: DEFAULT_MAX_SNAPSHOT_TXS,
            run_timeout: Duration::from_millis(DEFAULT_RUN_TIMEOUT_MS),
        }
    }
}

impl ProjectorConfig {
    /// Capacity limits handed to the engine for each run.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            max_block_weight: self.max_block_weight,
            max_block_sigops: self.max_block_sigops,
            max_blocks: self.max_blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_mainnet_limits() {
        let cfg = ProjectorConfig::default();
        assert_eq!(cfg.max_block_weight, 4_000_000);
        assert_eq!(cfg.max_block_sigops, 80_000);
        assert_eq!(cfg.max_blocks, 8);
    }

    #[test]
    fn default_timeout_is_one_minute() {
        let cfg = ProjectorConfig::default();
        assert_eq!(cfg.run_timeout, Duration::from_secs(60));
    }

    #[test]
    fn build_options_carry_custom_limits() {
        let cfg = ProjectorConfig {
            max_block_weight: 1_000_000,
            max_blocks: 3,
            ..ProjectorConfig::default()
        };
        let options = cfg.build_options();
        assert_eq!(options.max_block_weight, 1_000_000);
        assert_eq!(options.max_blocks, 3);
        assert_eq!(options.max_block_sigops, 80_000);
    }

    #[test]
    fn config_is_clone_and_debug() {
        let cfg = ProjectorConfig::default();
        let cfg2 = cfg.clone();
        let debug = format!("{cfg2:?}");
        assert!(debug.contains("ProjectorConfig"));
    }
}
