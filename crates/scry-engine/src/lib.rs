//! # scry-engine
//! The projection engine: partitions a mempool snapshot into the ordered
//! sequence of simulated blocks a fee-maximizing miner would produce.
//!
//! The selection rule is Bitcoin Core's `BlockAssembler` approximation:
//! candidates are whole ancestor packages ranked by package fee rate
//! (sigop-adjusted), committed atomically into capacity-bounded blocks,
//! with a deterministic txid-derived tie-break so identical snapshots
//! always yield identical templates.
//!
//! Pipeline: [`builder::build`] runs the greedy packing over an audit-pool
//! arena, then [`format::format_template`] shapes the committed blocks into
//! the published [`BlockTemplate`](scry_core::template::BlockTemplate).

mod audit;
mod graph;

pub mod builder;
pub mod format;

pub use builder::{build, BuildOptions, BuildResult, CancelFlag};
pub use format::format_template;
