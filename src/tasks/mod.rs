//! Library-wide chapter tasks
//!
//! Both tasks walk their items one at a time, report progress as a percentage
//! after each item, and keep going when a single item fails.

pub mod extract_images;
pub mod post_scan;

pub use extract_images::ExtractImagesTask;
pub use post_scan::PostScanTask;

use crate::error::{ChapterSyncError, Result};
use crate::library::VideoItem;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Receives task progress in percent (0 to 100)
pub trait ProgressReporter: Send + Sync {
    fn report(&self, percent: f64);
}

impl<F> ProgressReporter for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent)
    }
}

/// Progress sink that drops every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _percent: f64) {}
}

/// Per-item result of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOutcome {
    /// Persisted chapters were changed
    Updated,
    /// Chapters were already in sync
    Unchanged,
    /// Nothing to do for this item
    Skipped,
}

/// Counters for one task run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub total: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TaskSummary {
    fn record(&mut self, outcome: ScanOutcome) {
        match outcome {
            ScanOutcome::Updated => self.updated += 1,
            ScanOutcome::Unchanged => self.unchanged += 1,
            ScanOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Run `process` over `items` sequentially with progress, cancellation and
/// per-item failure isolation.
pub(crate) async fn run_items<'a, F, Fut>(
    task_name: &str,
    items: &'a [VideoItem],
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
    mut process: F,
) -> Result<TaskSummary>
where
    F: FnMut(&'a VideoItem) -> Fut,
    Fut: Future<Output = Result<ScanOutcome>>,
{
    let mut summary = TaskSummary {
        total: items.len(),
        ..TaskSummary::default()
    };

    info!("🚀 {}: processing {} items", task_name, items.len());

    for (index, item) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            info!("🛑 {} cancelled after {} of {} items", task_name, index, items.len());
            return Err(ChapterSyncError::Cancelled);
        }

        match process(item).await {
            Ok(outcome) => {
                debug!("{}: {} -> {:?}", task_name, item.name, outcome);
                summary.record(outcome);
            }
            Err(ChapterSyncError::Cancelled) => return Err(ChapterSyncError::Cancelled),
            Err(e) => {
                error!("❌ {} failed for {} ({}): {}", task_name, item.name, item.path.display(), e);
                summary.failed += 1;
            }
        }

        progress.report((index + 1) as f64 / items.len() as f64 * 100.0);
    }

    progress.report(100.0);

    info!(
        "✅ {} finished: {} updated, {} unchanged, {} skipped, {} failed",
        task_name, summary.updated, summary.unchanged, summary.skipped, summary.failed
    );

    Ok(summary)
}
