use crate::engine::SimulationEngine;
use crate::error::{Result, ThToolsError};
use crate::pool::{ChunkHandle, RayonPool, WorkerPool, available_workers};
use crate::result::{RunMetadata, ToeholdResult};
use crate::switch::SwitchConfig;
use crate::tubes::{ConstantBackground, TriggerSets, chunk_ranges};
use crate::worker::{PerTubeStatistics, SamplingSettings, WorkChunk, process_chunk};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    ops::Range,
    sync::Arc,
    time::{Duration, Instant},
};
use thtools_protocol::ThermoModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    /// Largest complex, in strands, the engine should consider.
    pub max_size: usize,
    /// Boltzmann samples drawn per complex.
    pub n_samples: usize,
    pub n_workers: usize,
    /// Only used when streaming; `run` submits one chunk per worker.
    pub chunks_per_worker: usize,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            max_size: 3,
            n_samples: 100,
            n_workers: available_workers(),
            chunks_per_worker: 1,
        }
    }
}

impl RunParams {
    pub fn new(max_size: usize, n_samples: usize, n_workers: usize) -> Self {
        Self {
            max_size,
            n_samples,
            n_workers,
            chunks_per_worker: 1,
        }
    }

    pub fn with_chunks_per_worker(mut self, chunks_per_worker: usize) -> Self {
        self.chunks_per_worker = chunks_per_worker;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(ThToolsError::config("max_size must be at least 1"));
        }
        if self.n_samples == 0 {
            return Err(ThToolsError::config("n_samples must be at least 1"));
        }
        if self.n_workers == 0 {
            return Err(ThToolsError::config("n_workers must be at least 1"));
        }
        if self.chunks_per_worker == 0 {
            return Err(ThToolsError::config("chunks_per_worker must be at least 1"));
        }
        Ok(())
    }

    fn settings(&self, model: &ThermoModel) -> SamplingSettings {
        SamplingSettings {
            max_size: self.max_size,
            n_samples: self.n_samples,
            model: model.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Log the duration of each run stage at info level.
    pub verbose_timing: bool,
}

/// Tests a toehold switch against every trigger set.
#[derive(Clone)]
pub struct ToeholdTest {
    switch: SwitchConfig,
    trigger_sets: TriggerSets,
    names: Option<Vec<Vec<String>>>,
    const_rna: ConstantBackground,
    model: ThermoModel,
    engine: Arc<dyn SimulationEngine>,
    options: RunOptions,
}

impl std::fmt::Debug for ToeholdTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToeholdTest")
            .field("switch", &self.switch)
            .field("trigger_sets", &self.trigger_sets.len())
            .field("const_rna", &self.const_rna.len())
            .field("model", &self.model)
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl ToeholdTest {
    pub fn new(
        switch: SwitchConfig,
        trigger_sets: TriggerSets,
        const_rna: ConstantBackground,
        model: ThermoModel,
        engine: Arc<dyn SimulationEngine>,
    ) -> Self {
        Self {
            switch,
            trigger_sets,
            names: None,
            const_rna,
            model,
            engine,
            options: RunOptions::default(),
        }
    }

    /// Validates raw matrices and builds a test; nothing is simulated here.
    pub fn configure(
        switch: SwitchConfig,
        triggers: Vec<Vec<String>>,
        concentrations: Vec<Vec<f64>>,
        const_rna: ConstantBackground,
        model: ThermoModel,
        engine: Arc<dyn SimulationEngine>,
    ) -> Result<Self> {
        let trigger_sets = TriggerSets::new(triggers, concentrations)?;
        Ok(Self::new(switch, trigger_sets, const_rna, model, engine))
    }

    /// Names for each trigger of each trigger set.
    pub fn with_names(mut self, names: Vec<Vec<String>>) -> Result<Self> {
        if names.len() != self.trigger_sets.len() {
            return Err(ThToolsError::config(format!(
                "{} name rows for {} trigger sets",
                names.len(),
                self.trigger_sets.len()
            )));
        }
        if let Some(row) = names
            .iter()
            .position(|n| n.len() != self.trigger_sets.width())
        {
            return Err(ThToolsError::config(format!(
                "Name row {row} does not match the trigger set width {}",
                self.trigger_sets.width()
            )));
        }
        self.names = Some(names);
        Ok(self)
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_model(mut self, model: ThermoModel) -> Self {
        self.model = model;
        self
    }

    pub fn switch(&self) -> &SwitchConfig {
        &self.switch
    }

    pub fn trigger_sets(&self) -> &TriggerSets {
        &self.trigger_sets
    }

    pub fn names(&self) -> Option<&[Vec<String>]> {
        self.names.as_deref()
    }

    pub fn const_rna(&self) -> &ConstantBackground {
        &self.const_rna
    }

    pub fn model(&self) -> &ThermoModel {
        &self.model
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    fn timing(&self, stage: &str, elapsed: Duration) {
        if self.options.verbose_timing {
            log::info!("{stage} took {:.3}s", elapsed.as_secs_f64());
        } else {
            log::debug!("{stage} took {:.3}s", elapsed.as_secs_f64());
        }
    }

    fn chunk(&self, index: usize, rows: Range<usize>) -> WorkChunk {
        WorkChunk {
            index,
            trigger_sets: self.trigger_sets.slice(rows.clone()),
            rows,
            switch: self.switch.clone(),
            const_rna: self.const_rna.clone(),
        }
    }

    fn isolated_chunk(&self) -> WorkChunk {
        WorkChunk {
            index: 0,
            rows: 0..0,
            trigger_sets: TriggerSets::empty(),
            switch: self.switch.clone(),
            const_rna: self.const_rna.clone(),
        }
    }

    fn submit_chunks<P: WorkerPool + ?Sized>(
        &self,
        pool: &P,
        settings: &SamplingSettings,
        n_chunks: usize,
    ) -> VecDeque<(WorkChunkInfo, ChunkHandle)> {
        chunk_ranges(self.trigger_sets.len(), n_chunks)
            .into_iter()
            .enumerate()
            .map(|(index, rows)| {
                let chunk = self.chunk(index, rows.clone());
                let engine = Arc::clone(&self.engine);
                let settings = settings.clone();
                log::debug!("dispatching chunk {index} (rows {}..{})", rows.start, rows.end);
                let handle = pool.submit(Box::new(move || {
                    process_chunk(&chunk, engine.as_ref(), &settings)
                }));
                (WorkChunkInfo { index, rows }, handle)
            })
            .collect()
    }

    fn metadata(
        &self,
        params: &RunParams,
        n_workers: usize,
        n_chunks: usize,
        runtime: Duration,
    ) -> RunMetadata {
        RunMetadata {
            switch: self.switch.sequence().to_string(),
            switch_concentration: self.switch.concentration(),
            rbs: self.switch.rbs(),
            aug: self.switch.aug(),
            const_rna: self
                .const_rna
                .iter()
                .map(|(s, c)| (s.to_string(), c))
                .collect(),
            model: self.model.clone(),
            max_size: params.max_size,
            n_samples: params.n_samples,
            n_workers,
            n_chunks,
            runtime_s: runtime.as_secs_f64(),
        }
    }

    fn build_result(
        &self,
        stats: PerTubeStatistics,
        params: &RunParams,
        n_workers: usize,
        n_chunks: usize,
        started: Instant,
    ) -> Result<ToeholdResult> {
        let merge_started = Instant::now();
        let meta = self.metadata(params, n_workers, n_chunks, started.elapsed());
        let result = ToeholdResult::new(
            self.trigger_sets.clone(),
            self.names.clone(),
            stats,
            meta,
        )?;
        self.timing("result assembly", merge_started.elapsed());
        log::info!(
            "finished {} trigger sets in {:.3}s; specificity {:.4} ± {:.4}",
            result.len(),
            started.elapsed().as_secs_f64(),
            result.specificity(),
            result.specificity_se()
        );
        Ok(result)
    }

    fn run_isolated(&self, settings: &SamplingSettings) -> Result<PerTubeStatistics> {
        log::info!("no trigger sets; simulating the switch with constant RNAs only");
        let started = Instant::now();
        let stats = process_chunk(&self.isolated_chunk(), self.engine.as_ref(), settings)?;
        self.timing("isolated simulation", started.elapsed());
        Ok(stats)
    }

    /// Runs every trigger set on a fresh rayon pool of `n_workers` threads.
    pub fn run(&self, params: &RunParams) -> Result<ToeholdResult> {
        params.validate()?;
        if self.trigger_sets.is_empty() {
            return self.run_with_pool(params, &crate::pool::InlinePool);
        }
        let pool = RayonPool::new(params.n_workers)?;
        self.run_with_pool(params, &pool)
    }

    /// Runs every trigger set on `pool`, one chunk per worker.
    ///
    /// Every submitted chunk is waited for before returning, also on failure.
    pub fn run_with_pool<P: WorkerPool + ?Sized>(
        &self,
        params: &RunParams,
        pool: &P,
    ) -> Result<ToeholdResult> {
        params.validate()?;
        let started = Instant::now();
        let settings = params.settings(&self.model);
        if self.trigger_sets.is_empty() {
            let stats = self.run_isolated(&settings)?;
            return self.build_result(stats, params, 1, 1, started);
        }
        let n_workers = pool.workers().max(1);
        log::info!(
            "testing {} trigger sets on {n_workers} workers",
            self.trigger_sets.len()
        );
        let pending = self.submit_chunks(pool, &settings, n_workers);
        let n_chunks = pending.len();
        self.timing("dispatch", started.elapsed());

        let mut merged = PerTubeStatistics::with_capacity(self.trigger_sets.len());
        let mut failure: Option<ThToolsError> = None;
        for (info, handle) in pending {
            match handle.wait().and_then(|stats| info.check(stats)) {
                Ok(stats) => {
                    if failure.is_none() {
                        merged.extend(&stats);
                    }
                }
                Err(e) => {
                    log::warn!("chunk {} failed: {e}", info.index);
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        self.timing("simulation", started.elapsed());
        self.build_result(merged, params, n_workers, n_chunks, started)
    }

    /// Streams chunk results as they are merged, on a fresh rayon pool.
    pub fn generate(&self, params: &RunParams) -> Result<ChunkStream<RayonPool>> {
        params.validate()?;
        let pool = RayonPool::new(params.n_workers)?;
        self.generate_with_pool(params, pool)
    }

    /// Submits `chunks_per_worker` chunks per worker of `pool` and returns a stream over them.
    ///
    /// The stream owns the pool; results come out in row order.
    pub fn generate_with_pool<P: WorkerPool>(
        &self,
        params: &RunParams,
        pool: P,
    ) -> Result<ChunkStream<P>> {
        params.validate()?;
        let started = Instant::now();
        let settings = params.settings(&self.model);
        let n_workers = pool.workers().max(1);
        let (pending, isolated) = if self.trigger_sets.is_empty() {
            (VecDeque::new(), Some(self.isolated_chunk()))
        } else {
            let n_chunks = n_workers * params.chunks_per_worker;
            (self.submit_chunks(&pool, &settings, n_chunks), None)
        };
        let total = pending.len().max(usize::from(isolated.is_some()));
        log::info!(
            "streaming {} trigger sets in {total} chunks on {n_workers} workers",
            self.trigger_sets.len()
        );
        Ok(ChunkStream {
            test: self.clone(),
            params: params.clone(),
            settings,
            pool,
            n_workers,
            pending,
            isolated,
            collected: PerTubeStatistics::with_capacity(self.trigger_sets.len()),
            total,
            completed: 0,
            failed: false,
            started,
        })
    }
}

#[derive(Debug, Clone)]
struct WorkChunkInfo {
    index: usize,
    rows: Range<usize>,
}

impl WorkChunkInfo {
    fn check(&self, stats: PerTubeStatistics) -> Result<PerTubeStatistics> {
        if stats.len() != self.rows.len() {
            return Err(ThToolsError::engine(format!(
                "Chunk {} returned {} rows for {} trigger sets",
                self.index,
                stats.len(),
                self.rows.len()
            )));
        }
        Ok(stats)
    }
}

/// Statistics of one finished chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkProgress {
    pub index: usize,
    pub rows: Range<usize>,
    pub stats: PerTubeStatistics,
    pub completed: usize,
    pub total: usize,
}

impl ChunkProgress {
    pub fn fraction_done(&self) -> f64 {
        self.completed as f64 / self.total.max(1) as f64
    }
}

/// Lazily yields chunk results in row order; single use.
///
/// The full [`ToeholdResult`] is available from [`ChunkStream::into_result`],
/// which first consumes whatever the caller has not. Dropping the stream waits
/// for every chunk still in flight.
pub struct ChunkStream<P: WorkerPool = RayonPool> {
    test: ToeholdTest,
    params: RunParams,
    settings: SamplingSettings,
    pool: P,
    n_workers: usize,
    pending: VecDeque<(WorkChunkInfo, ChunkHandle)>,
    isolated: Option<WorkChunk>,
    collected: PerTubeStatistics,
    total: usize,
    completed: usize,
    failed: bool,
    started: Instant,
}

impl<P: WorkerPool> ChunkStream<P> {
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    fn drain_pending(&mut self) {
        while let Some((_, handle)) = self.pending.pop_front() {
            let _ = handle.wait();
        }
    }

    fn fail(&mut self, e: ThToolsError) -> Option<Result<ChunkProgress>> {
        self.failed = true;
        self.drain_pending();
        Some(Err(e))
    }

    /// Consumes the rest of the stream and assembles the result.
    pub fn into_result(mut self) -> Result<ToeholdResult> {
        while let Some(progress) = self.next() {
            progress?;
        }
        if self.failed {
            return Err(ThToolsError::engine("Stream already failed"));
        }
        let stats = std::mem::take(&mut self.collected);
        self.test.timing("streamed simulation", self.started.elapsed());
        self.test.build_result(
            stats,
            &self.params,
            self.n_workers,
            self.total,
            self.started,
        )
    }
}

impl<P: WorkerPool> Iterator for ChunkStream<P> {
    type Item = Result<ChunkProgress>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(chunk) = self.isolated.take() {
            let stats = match self.test.run_isolated(&self.settings) {
                Ok(stats) => stats,
                Err(e) => return self.fail(e),
            };
            debug_assert!(chunk.trigger_sets.is_empty());
            self.collected.extend(&stats);
            self.completed += 1;
            return Some(Ok(ChunkProgress {
                index: chunk.index,
                rows: chunk.rows,
                stats,
                completed: self.completed,
                total: self.total,
            }));
        }
        let (info, handle) = self.pending.pop_front()?;
        let chunk_started = Instant::now();
        match handle.wait().and_then(|stats| info.check(stats)) {
            Ok(stats) => {
                self.collected.extend(&stats);
                self.completed += 1;
                self.test
                    .timing(&format!("waiting for chunk {}", info.index), chunk_started.elapsed());
                Some(Ok(ChunkProgress {
                    index: info.index,
                    rows: info.rows,
                    stats,
                    completed: self.completed,
                    total: self.total,
                }))
            }
            Err(e) => {
                log::warn!("chunk {} failed: {e}", info.index);
                self.fail(e)
            }
        }
    }
}

impl<P: WorkerPool> Drop for ChunkStream<P> {
    fn drop(&mut self) {
        self.drain_pending();
    }
}
