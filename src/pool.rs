//! Task-queue view of a worker pool: submit a chunk job, get a handle back.
//!
//! The orchestrator only depends on [`WorkerPool`], so chunks can run on the
//! rayon pool, inline on the calling thread, or anywhere else that can hand a
//! result back through a [`ChunkHandle`].

use crate::error::{Result, ThToolsError};
use crate::worker::PerTubeStatistics;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::mpsc,
};

pub type ChunkJob = Box<dyn FnOnce() -> Result<PerTubeStatistics> + Send + 'static>;

pub struct ChunkHandle {
    receiver: mpsc::Receiver<Result<PerTubeStatistics>>,
}

impl ChunkHandle {
    pub fn channel() -> (mpsc::Sender<Result<PerTubeStatistics>>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }

    pub fn ready(result: Result<PerTubeStatistics>) -> Self {
        let (sender, handle) = Self::channel();
        let _ = sender.send(result);
        handle
    }

    pub fn wait(self) -> Result<PerTubeStatistics> {
        self.receiver.recv().unwrap_or_else(|_| {
            Err(ThToolsError::engine(
                "Worker stopped without reporting its chunk",
            ))
        })
    }
}

/// Runs a job, turning a panic into an engine failure for its chunk.
pub fn run_guarded(job: ChunkJob) -> Result<PerTubeStatistics> {
    catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ThToolsError::engine(format!("Worker panicked: {message}")))
    })
}

pub trait WorkerPool {
    fn workers(&self) -> usize;

    fn submit(&self, job: ChunkJob) -> ChunkHandle;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InlinePool;

impl WorkerPool for InlinePool {
    fn workers(&self) -> usize {
        1
    }

    fn submit(&self, job: ChunkJob) -> ChunkHandle {
        ChunkHandle::ready(run_guarded(job))
    }
}

/// A dedicated rayon thread pool, released when dropped.
pub struct RayonPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl RayonPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("thtools-worker-{i}"))
            .build()
            .map_err(|e| ThToolsError::engine(format!("Could not start worker pool: {e}")))?;
        Ok(Self { pool, workers })
    }
}

impl WorkerPool for RayonPool {
    fn workers(&self) -> usize {
        self.workers
    }

    fn submit(&self, job: ChunkJob) -> ChunkHandle {
        let (sender, handle) = ChunkHandle::channel();
        self.pool.spawn(move || {
            let _ = sender.send(run_guarded(job));
        });
        handle
    }
}

pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
