//! Scry CLI.
//!
//! Decodes a binary mempool snapshot, runs one projection, and prints the
//! resulting block template as JSON or a human-readable summary.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use scry_core::snapshot;
use scry_core::template::BlockTemplate;
use scry_node_lib::{Projector, ProjectorConfig};
use tracing::{info, warn};

/// Scry — project a mempool snapshot into the blocks a miner would build.
#[derive(Parser, Debug)]
#[command(name = "scry", version, about = "Mempool block-template projection")]
struct Args {
    /// Snapshot file to project ("-" reads from stdin)
    snapshot: PathBuf,

    /// Projection horizon in blocks (the last block is unbounded)
    #[arg(long, default_value_t = scry_core::constants::DEFAULT_PROJECTED_BLOCKS)]
    max_blocks: usize,

    /// Weight ceiling per block, in weight units
    #[arg(long, default_value_t = scry_core::constants::MAX_BLOCK_WEIGHT)]
    block_weight: u32,

    /// Run budget in milliseconds
    #[arg(long, default_value_t = scry_core::constants::DEFAULT_RUN_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Output format ("json" or "summary")
    #[arg(long, default_value = "summary")]
    output: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    let bytes = read_snapshot(&args.snapshot)?;
    let (snap, stats) = snapshot::decode(&bytes)
        .with_context(|| format!("decoding snapshot {:?}", args.snapshot))?;
    info!(
        "decoded {} txs ({} records dropped, {} edges dropped)",
        stats.decoded, stats.dropped_records, stats.dropped_edges
    );
    if stats.truncated {
        warn!("snapshot was truncated; projecting the decoded prefix");
    }

    let config = ProjectorConfig {
        max_blocks: args.max_blocks,
        max_block_weight: args.block_weight,
        run_timeout: Duration::from_millis(args.timeout_ms),
        ..ProjectorConfig::default()
    };
    let projector = Projector::new(config);
    let template = projector.project(snap).await.context("projection failed")?;

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(template.as_ref())?);
    } else {
        print_summary(&template);
    }
    Ok(())
}

fn read_snapshot(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading snapshot from stdin")?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("reading snapshot {path:?}"))
    }
}

fn print_summary(template: &BlockTemplate) {
    println!(
        "{} blocks, {} txs, {} clusters, {} rate updates",
        template.blocks.len(),
        template.tx_count(),
        template.clusters.len(),
        template.rates.len()
    );
    for (index, block) in template.blocks.iter().enumerate() {
        println!(
            "block {index}: {} txs, {} WU, {} sat fees, median {:.2} sat/vB, range {:?}",
            block.stats.tx_count,
            block.stats.weight,
            block.stats.fee_total,
            block.stats.median_fee,
            block.stats.fee_range
        );
    }
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output (suitable for log
/// aggregation pipelines). Any other value defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
