//! The template publisher: runs projections off the async path and
//! publishes completed templates atomically.
//!
//! One [`Projector`] serves one mempool feed. Each call to
//! [`Projector::project`] gets a monotonically increasing generation;
//! starting a new run cancels the one in flight, and a finished run is
//! published only while its generation is still the newest started.
//! Consumers therefore observe complete templates only, each strictly
//! newer than the last.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use scry_core::error::ProjectError;
use scry_core::template::BlockTemplate;
use scry_core::types::Snapshot;
use scry_engine::{build, format_template, CancelFlag};

use crate::config::ProjectorConfig;

/// Runs the projection engine on a blocking thread and publishes templates
/// through a watch channel.
pub struct Projector {
    config: ProjectorConfig,
    sender: watch::Sender<Option<Arc<BlockTemplate>>>,
    /// Next generation to assign; its current value is the newest started.
    generation: AtomicU64,
    /// Highest generation published so far, guarded so the check and the
    /// send are one step.
    published: Mutex<u64>,
    /// Cancel flag of the in-flight run, if any.
    in_flight: Mutex<Option<CancelFlag>>,
}

impl Projector {
    pub fn new(config: ProjectorConfig) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            config,
            sender,
            generation: AtomicU64::new(0),
            published: Mutex::new(0),
            in_flight: Mutex::new(None),
        }
    }

    /// Subscribe to published templates. The receiver starts at the current
    /// value (`None` before the first completed run).
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<BlockTemplate>>> {
        self.sender.subscribe()
    }

    /// The most recently published template, if any run has completed.
    pub fn current(&self) -> Option<Arc<BlockTemplate>> {
        self.sender.borrow().clone()
    }

    /// Run one projection over `snapshot` and publish the result.
    ///
    /// The engine runs on a blocking thread under the configured timeout.
    /// Any failure leaves the previously published template untouched.
    ///
    /// # Errors
    ///
    /// - [`ProjectError::SnapshotTooLarge`] before any work starts.
    /// - [`ProjectError::Timeout`] when the run budget expires; the run is
    ///   cancelled.
    /// - [`ProjectError::Superseded`] when a newer run started before this
    ///   one finished.
    /// - [`ProjectError::WorkerPanicked`] if the engine thread panicked.
    pub async fn project(&self, snapshot: Snapshot) -> Result<Arc<BlockTemplate>, ProjectError> {
        if snapshot.len() > self.config.max_snapshot_txs {
            return Err(ProjectError::SnapshotTooLarge {
                txs: snapshot.len(),
                limit: self.config.max_snapshot_txs,
            });
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancelFlag::new();
        {
            let mut in_flight = self.in_flight.lock();
            if let Some(previous) = in_flight.replace(cancel.clone()) {
                previous.cancel();
            }
        }
        debug!("projection run {generation}: {} txs", snapshot.len());

        let options = self.config.build_options();
        let worker_cancel = cancel.clone();
        let handle = task::spawn_blocking(move || {
            let result = build(&snapshot, &options, &worker_cancel)?;
            Ok::<_, ProjectError>(Arc::new(format_template(&snapshot, &result)))
        });

        let template = match timeout(self.config.run_timeout, handle).await {
            Err(_) => {
                cancel.cancel();
                warn!("projection run {generation} timed out");
                return Err(ProjectError::Timeout(self.config.run_timeout));
            }
            Ok(Err(join_error)) => {
                warn!("projection worker failed: {join_error}");
                return Err(ProjectError::WorkerPanicked);
            }
            Ok(Ok(result)) => result?,
        };

        let newest = self.generation.load(Ordering::SeqCst);
        let mut published = self.published.lock();
        if generation < newest {
            debug!("projection run {generation} superseded by {newest}");
            return Err(ProjectError::Superseded { newest });
        }
        if generation > *published {
            *published = generation;
            self.sender.send_replace(Some(Arc::clone(&template)));
            info!(
                "published template {generation}: {} blocks, {} txs",
                template.blocks.len(),
                template.tx_count()
            );
        }
        Ok(template)
    }
}
