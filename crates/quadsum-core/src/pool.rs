//! Fixed-size worker pool both engines dispatch onto.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::timing::{Phase, Timeline, TimingEvent};
use crate::{EngineConfig, Result};

/// A fixed set of worker threads.
///
/// Every call to [`WorkerPool::run_phase`] is one dispatch: it returns only
/// after all parallel work spawned inside it has completed, which makes it the
/// barrier between consecutive phases.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `threads` workers (`0` for one per core).
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("quadsum-worker-{index}"))
            .build()?;
        debug!(threads = pool.current_num_threads(), "Worker pool ready");
        Ok(Self { pool })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Arc<Self>> {
        Self::new(config.threads).map(Arc::new)
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` on the pool and record it on `timeline` as `phase`.
    pub fn run_phase<R, F>(&self, timeline: &mut Timeline, phase: Phase, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        let epoch = timeline.epoch();
        let queued = timeline.elapsed();
        let (result, start, end) = self.pool.install(|| {
            let start = epoch.elapsed();
            let result = op();
            (result, start, epoch.elapsed())
        });
        timeline.push(TimingEvent {
            phase,
            queued,
            start,
            end,
        });
        result
    }

    /// Run `op` on the pool without recording it.
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }
}
