//! Deterministic stand-ins for the sampling engine and the worker pool.

use crate::engine::SimulationEngine;
use crate::error::{Result, ThToolsError};
use crate::pool::{ChunkHandle, ChunkJob, WorkerPool, run_guarded};
use crate::result::RunMetadata;
use crate::switch::SwitchConfig;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};
use thtools_protocol::{ComplexRecord, ThermoModel, TubeResult, TubeSpec};

pub const TEST_THS: &str =
    "UUAGCCGCUGUCACACGCACAGGGAUUUACAAAAAGAGGAGAGUAAAAUGCUGUGCGUGCACCAUAAAACGAACAUAGAC";
pub const TEST_RBS: &str = "AGAGGAGA";

pub fn test_switch() -> SwitchConfig {
    SwitchConfig::with_rbs_sequence(TEST_THS, 1e-7, TEST_RBS).unwrap()
}

pub fn test_meta() -> RunMetadata {
    let switch = test_switch();
    RunMetadata {
        switch: switch.sequence().to_string(),
        switch_concentration: switch.concentration(),
        rbs: switch.rbs(),
        aug: switch.aug(),
        const_rna: vec![],
        model: ThermoModel::default(),
        max_size: 2,
        n_samples: 10,
        n_workers: 1,
        n_chunks: 1,
        runtime_s: 0.0,
    }
}

/// Hairpin closed over the whole switch: every region paired.
pub fn closed_structure(len: usize) -> String {
    let half = len / 2;
    format!("{}{}", "(".repeat(half), ")".repeat(len - half))
}

pub fn open_structure(len: usize) -> String {
    ".".repeat(len)
}

/// Sampler whose output depends only on each tube's own strands.
///
/// The first strand of a tube is taken as the switch. Each other strand binds
/// a fraction of it given by `with_binding` (0 when unknown); the strongest
/// binder forms a dimer with the switch that is open in 9 of every 10 samples.
/// At a temperature of 90 °C or above the weakest known binder wins instead.
#[derive(Debug, Default)]
pub struct FakeEngine {
    bindings: HashMap<String, f64>,
    sample_override: Option<usize>,
    fail_on: Option<String>,
    calls: AtomicUsize,
    tubes_seen: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binding(mut self, trigger: &str, fraction: f64) -> Self {
        self.bindings.insert(trigger.to_string(), fraction);
        self
    }

    pub fn with_sample_override(mut self, n_samples: usize) -> Self {
        self.sample_override = Some(n_samples);
        self
    }

    /// Fails every call whose tubes contain `strand`.
    pub fn with_failure_on(mut self, strand: &str) -> Self {
        self.fail_on = Some(strand.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tubes_seen(&self) -> usize {
        self.tubes_seen.load(Ordering::SeqCst)
    }

    fn binding(&self, sequence: &str, celsius: f64) -> f64 {
        let b = self.bindings.get(sequence).copied().unwrap_or(0.0);
        if celsius >= 90.0 && b > 0.0 { 1.0 - b } else { b }
    }

    fn sample_tube(&self, tube: &TubeSpec, n_samples: usize, model: &ThermoModel) -> TubeResult {
        let n_samples = self.sample_override.unwrap_or(n_samples);
        let Some(switch) = tube.strands.first() else {
            return TubeResult::default();
        };
        let len = switch.sequence.len();
        let mut best: Option<(&str, f64)> = None;
        for strand in &tube.strands[1..] {
            let b = self.binding(&strand.sequence, model.celsius);
            if b > 0.0 && best.is_none_or(|(_, top)| b > top) {
                best = Some((&strand.sequence, b));
            }
        }
        let bound = best.map(|(_, b)| b).unwrap_or(0.0);
        let mut complexes = vec![ComplexRecord {
            strands: vec![switch.sequence.clone()],
            concentration: switch.concentration * (1.0 - bound),
            structures: vec![closed_structure(len); n_samples],
        }];
        if let Some((trigger, b)) = best {
            let structures = (0..n_samples)
                .map(|i| {
                    let own = if i % 10 == 9 {
                        closed_structure(len)
                    } else {
                        open_structure(len)
                    };
                    format!("{own}+{}", open_structure(trigger.len()))
                })
                .collect();
            complexes.push(ComplexRecord {
                strands: vec![switch.sequence.clone(), trigger.to_string()],
                concentration: switch.concentration * b,
                structures,
            });
        }
        for strand in &tube.strands[1..] {
            complexes.push(ComplexRecord {
                strands: vec![strand.sequence.clone()],
                concentration: strand.concentration,
                structures: vec![open_structure(strand.sequence.len()); n_samples],
            });
        }
        TubeResult { complexes }
    }
}

impl SimulationEngine for FakeEngine {
    fn simulate(
        &self,
        tubes: &[TubeSpec],
        n_samples: usize,
        model: &ThermoModel,
    ) -> Result<Vec<TubeResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tubes_seen.fetch_add(tubes.len(), Ordering::SeqCst);
        if let Some(strand) = &self.fail_on {
            if tubes
                .iter()
                .any(|t| t.strands.iter().any(|s| &s.sequence == strand))
            {
                return Err(ThToolsError::engine(format!("Sampler crashed on {strand}")));
            }
        }
        Ok(tubes
            .iter()
            .map(|t| self.sample_tube(t, n_samples, model))
            .collect())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Debug, Default)]
pub struct FailingEngine;

impl SimulationEngine for FailingEngine {
    fn simulate(&self, _: &[TubeSpec], _: usize, _: &ThermoModel) -> Result<Vec<TubeResult>> {
        Err(ThToolsError::engine("Sampler crashed"))
    }
}

/// Finishes later submissions first.
#[derive(Debug, Default)]
pub struct ReversingPool {
    submitted: AtomicUsize,
    pub completion_order: Arc<Mutex<Vec<usize>>>,
}

impl ReversingPool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkerPool for ReversingPool {
    fn workers(&self) -> usize {
        4
    }

    fn submit(&self, job: ChunkJob) -> ChunkHandle {
        let index = self.submitted.fetch_add(1, Ordering::SeqCst);
        let order = Arc::clone(&self.completion_order);
        let (sender, handle) = ChunkHandle::channel();
        thread::spawn(move || {
            let delay = 200u64.saturating_sub(25 * index as u64);
            thread::sleep(Duration::from_millis(delay));
            let result = run_guarded(job);
            if let Ok(mut order) = order.lock() {
                order.push(index);
            }
            let _ = sender.send(result);
        });
        handle
    }
}

/// Runs each job on its own thread, earlier submissions finishing first, and
/// counts submitted and completed jobs. Clones share the counts.
#[derive(Debug, Clone, Default)]
pub struct CountingPool {
    submitted: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl CountingPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl WorkerPool for CountingPool {
    fn workers(&self) -> usize {
        3
    }

    fn submit(&self, job: ChunkJob) -> ChunkHandle {
        let index = self.submitted.fetch_add(1, Ordering::SeqCst);
        let completed = Arc::clone(&self.completed);
        let (sender, handle) = ChunkHandle::channel();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20 + 30 * index as u64));
            let result = run_guarded(job);
            completed.fetch_add(1, Ordering::SeqCst);
            let _ = sender.send(result);
        });
        handle
    }
}
