use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use log::{debug, error, warn};
use rayon::prelude::*;
use crate::convert::report::RunReport;
use crate::convert::work_item::{ConversionWorkItem, ItemOutcome, SkipReason};
use crate::utils::parallel::ParallelProcessor;
use crate::utils::progress::ProgressSink;
use crate::{Result, SourceFile};

/// Batch-level stop signal. Raising it stops dispatch of new items; items
/// already handed to a worker run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs work items on a bounded pool of OS threads.
pub struct ParallelScheduler {
    workers: usize,
}

impl ParallelProcessor for ParallelScheduler {}

impl ParallelScheduler {
    pub fn new(workers: Option<usize>) -> Self {
        Self {
            workers: Self::worker_count(workers),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Processes every source exactly once, recording each terminal outcome
    /// in `report` as it completes. At most `workers` items are in flight.
    ///
    /// A failing or panicking item is recorded as `Failed` and never stops
    /// the rest of the batch.
    pub fn run<F>(
        &self,
        sources: &[SourceFile],
        cancel: &CancellationToken,
        report: &RunReport,
        sink: &dyn ProgressSink,
        process: F,
    ) -> Result<()>
    where
        F: Fn(ConversionWorkItem<'_>) -> ItemOutcome + Send + Sync,
    {
        let pool = Self::build_pool(self.workers)?;
        let total = sources.len();

        pool.install(|| {
            sources.par_iter().with_max_len(1).for_each(|source| {
                let item = ConversionWorkItem::new(source);
                let outcome = if cancel.is_cancelled() {
                    debug!("Cancelled before dispatch: {}", source.path.display());
                    item.skip(SkipReason::Cancelled)
                } else {
                    Self::run_isolated(source, item, &process)
                };
                let done = report.record(outcome.clone());
                sink.item_finished(&outcome, done, total);
            });
        });

        if cancel.is_cancelled() {
            warn!("Batch cancelled; undispatched items were marked as cancelled");
        }
        Ok(())
    }

    fn run_isolated<F>(source: &SourceFile, item: ConversionWorkItem<'_>, process: &F) -> ItemOutcome
    where
        F: Fn(ConversionWorkItem<'_>) -> ItemOutcome,
    {
        // The item is moved into the closure; on panic we rebuild a failed
        // outcome from the source it referenced.
        match panic::catch_unwind(AssertUnwindSafe(|| process(item))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Worker panicked on {}: {}", source.path.display(), message);
                ConversionWorkItem::new(source).fail(format!("worker panicked: {}", message))
            }
        }
    }
}
