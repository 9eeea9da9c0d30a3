use crate::classifier::{RegionExposure, classify};
use crate::engine::SimulationEngine;
use crate::error::{Result, ThToolsError};
use crate::reducer::{TubeStatistics, TubeTotals, reduce_complex};
use crate::switch::SwitchConfig;
use crate::tubes::{ConstantBackground, TriggerSets};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thtools_protocol::{ComplexRecord, StrandSpec, ThermoModel, TubeResult, TubeSpec};

#[derive(Debug, Clone)]
pub struct WorkChunk {
    pub index: usize,
    pub rows: Range<usize>,
    pub trigger_sets: TriggerSets,
    pub switch: SwitchConfig,
    pub const_rna: ConstantBackground,
}

#[derive(Debug, Clone)]
pub struct SamplingSettings {
    pub max_size: usize,
    pub n_samples: usize,
    pub model: ThermoModel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerTubeStatistics {
    pub activation: Vec<f64>,
    pub rbs_unbinding: Vec<f64>,
    pub aug_unbinding: Vec<f64>,
    pub post_aug_unbinding: Vec<f64>,
    pub activation_se: Vec<f64>,
}

impl PerTubeStatistics {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            activation: Vec::with_capacity(n),
            rbs_unbinding: Vec::with_capacity(n),
            aug_unbinding: Vec::with_capacity(n),
            post_aug_unbinding: Vec::with_capacity(n),
            activation_se: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, s: TubeStatistics) {
        self.activation.push(s.activation);
        self.rbs_unbinding.push(s.rbs_unbinding);
        self.aug_unbinding.push(s.aug_unbinding);
        self.post_aug_unbinding.push(s.post_aug_unbinding);
        self.activation_se.push(s.activation_se);
    }

    pub fn extend(&mut self, other: &Self) {
        self.activation.extend_from_slice(&other.activation);
        self.rbs_unbinding.extend_from_slice(&other.rbs_unbinding);
        self.aug_unbinding.extend_from_slice(&other.aug_unbinding);
        self.post_aug_unbinding
            .extend_from_slice(&other.post_aug_unbinding);
        self.activation_se.extend_from_slice(&other.activation_se);
    }

    pub fn row(&self, index: usize) -> Option<TubeStatistics> {
        Some(TubeStatistics {
            activation: *self.activation.get(index)?,
            rbs_unbinding: *self.rbs_unbinding.get(index)?,
            aug_unbinding: *self.aug_unbinding.get(index)?,
            post_aug_unbinding: *self.post_aug_unbinding.get(index)?,
            activation_se: *self.activation_se.get(index)?,
        })
    }

    pub fn len(&self) -> usize {
        self.activation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activation.is_empty()
    }
}

fn push_strand(strands: &mut Vec<StrandSpec>, sequence: &str, concentration: f64) {
    match strands.iter_mut().find(|s| s.sequence == sequence) {
        Some(existing) => {
            log::warn!(
                "strand {sequence} appears twice in one tube; keeping concentration {concentration}"
            );
            existing.concentration = concentration;
        }
        None => strands.push(StrandSpec {
            sequence: sequence.to_string(),
            concentration,
        }),
    }
}

/// Switch, then constant RNAs, then the trigger set.
pub fn build_tube(
    switch: &SwitchConfig,
    const_rna: &ConstantBackground,
    triggers: &[String],
    concentrations: &[f64],
    max_size: usize,
) -> TubeSpec {
    let mut strands = Vec::with_capacity(1 + const_rna.len() + triggers.len());
    push_strand(&mut strands, switch.sequence(), switch.concentration());
    for (sequence, concentration) in const_rna.iter() {
        push_strand(&mut strands, sequence, concentration);
    }
    for (sequence, &concentration) in triggers.iter().zip(concentrations) {
        push_strand(&mut strands, sequence, concentration);
    }
    TubeSpec {
        strands,
        max_complex_size: max_size,
    }
}

impl WorkChunk {
    pub fn tubes(&self, max_size: usize) -> Vec<TubeSpec> {
        if self.trigger_sets.is_empty() {
            return vec![build_tube(&self.switch, &self.const_rna, &[], &[], max_size)];
        }
        self.trigger_sets
            .triggers()
            .iter()
            .zip(self.trigger_sets.concentrations())
            .map(|(triggers, concs)| {
                build_tube(&self.switch, &self.const_rna, triggers, concs, max_size)
            })
            .collect()
    }
}

/// Classifies every switch strand of every sample in one complex.
fn complex_exposures(
    complex: &ComplexRecord,
    switch: &SwitchConfig,
    n_samples: usize,
) -> Result<(usize, Vec<RegionExposure>)> {
    let slots: Vec<usize> = complex
        .strands
        .iter()
        .enumerate()
        .filter(|(_, s)| s.as_str() == switch.sequence())
        .map(|(i, _)| i)
        .collect();
    if slots.is_empty() {
        return Ok((0, vec![]));
    }
    if complex.structures.len() != n_samples {
        return Err(ThToolsError::engine(format!(
            "Complex {} has {} structure samples, expected {n_samples}",
            complex.strands.join("+"),
            complex.structures.len()
        )));
    }
    let regions = switch.regions();
    let mut exposures = Vec::with_capacity(slots.len() * n_samples);
    for structure in &complex.structures {
        let parts: Vec<&str> = structure.split('+').collect();
        if parts.len() != complex.strands.len() {
            return Err(ThToolsError::engine(format!(
                "Structure '{structure}' has {} strands but its complex has {}",
                parts.len(),
                complex.strands.len()
            )));
        }
        for &slot in &slots {
            let part = parts[slot];
            if part.len() != switch.len() {
                return Err(ThToolsError::engine(format!(
                    "Switch structure '{part}' has length {}, expected {}",
                    part.len(),
                    switch.len()
                )));
            }
            exposures.push(classify(part, &regions));
        }
    }
    Ok((slots.len(), exposures))
}

fn reduce_tube(
    tube: &TubeResult,
    switch: &SwitchConfig,
    n_samples: usize,
) -> Result<TubeStatistics> {
    let mut totals = TubeTotals::default();
    for complex in &tube.complexes {
        if !(complex.concentration.is_finite() && complex.concentration >= 0.0) {
            return Err(ThToolsError::engine(format!(
                "Complex {} has invalid concentration {}",
                complex.strands.join("+"),
                complex.concentration
            )));
        }
        let (occurrences, exposures) = complex_exposures(complex, switch, n_samples)?;
        if let Some(contribution) =
            reduce_complex(complex.concentration, n_samples, occurrences, &exposures)
        {
            totals.add(&contribution);
        }
    }
    Ok(totals.normalize(switch.concentration()))
}

/// Simulates a whole chunk with a single engine call and reduces it to statistics.
pub fn process_chunk(
    chunk: &WorkChunk,
    engine: &dyn SimulationEngine,
    settings: &SamplingSettings,
) -> Result<PerTubeStatistics> {
    let tubes = chunk.tubes(settings.max_size);
    let results = engine.simulate(&tubes, settings.n_samples, &settings.model)?;
    if results.len() != tubes.len() {
        return Err(ThToolsError::engine(format!(
            "Engine '{}' returned {} tube results for {} tubes in chunk {}",
            engine.name(),
            results.len(),
            tubes.len(),
            chunk.index
        )));
    }
    let mut stats = PerTubeStatistics::with_capacity(results.len());
    for tube in &results {
        stats.push(reduce_tube(tube, &chunk.switch, settings.n_samples)?);
    }
    log::debug!(
        "chunk {} (rows {}..{}) reduced {} tubes",
        chunk.index,
        chunk.rows.start,
        chunk.rows.end,
        stats.len()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEngine, FakeEngine, test_switch};

    fn chunk(triggers: &[&str]) -> WorkChunk {
        let rows: Vec<Vec<String>> = triggers.iter().map(|t| vec![t.to_string()]).collect();
        WorkChunk {
            index: 0,
            rows: 0..rows.len(),
            trigger_sets: TriggerSets::uniform(&rows, 1e-7).unwrap(),
            switch: test_switch(),
            const_rna: ConstantBackground::new(),
        }
    }

    fn settings() -> SamplingSettings {
        SamplingSettings {
            max_size: 2,
            n_samples: 20,
            model: ThermoModel::default(),
        }
    }

    #[test]
    fn test_tube_layout() {
        let mut c = chunk(&["GGGG"]);
        c.const_rna = ConstantBackground::from_pairs([("CCCC", 5e-8)]).unwrap();
        let tubes = c.tubes(3);
        assert_eq!(tubes.len(), 1);
        let seqs: Vec<&str> = tubes[0].strands.iter().map(|s| s.sequence.as_str()).collect();
        assert_eq!(seqs, vec![c.switch.sequence(), "CCCC", "GGGG"]);
        assert_eq!(tubes[0].max_complex_size, 3);
    }

    #[test]
    fn test_empty_chunk_simulates_switch_alone() {
        let c = chunk(&[]);
        let tubes = c.tubes(2);
        assert_eq!(tubes.len(), 1);
        assert_eq!(tubes[0].strands.len(), 1);
    }

    #[test]
    fn test_rows_follow_input_order() {
        let engine = FakeEngine::new().with_binding("AAAA", 0.9).with_binding("CCCC", 0.2);
        let stats = process_chunk(&chunk(&["CCCC", "GGGG", "AAAA"]), &engine, &settings()).unwrap();
        assert_eq!(stats.len(), 3);
        assert!(stats.activation[2] > stats.activation[0]);
        assert!(stats.activation[0] > stats.activation[1]);
        assert_eq!(stats.activation[1], 0.0);
        assert!(stats.activation_se.iter().all(|se| se.is_finite() && *se >= 0.0));
    }

    #[test]
    fn test_engine_failure_fails_whole_chunk() {
        let err = process_chunk(&chunk(&["AAAA"]), &FailingEngine, &settings()).unwrap_err();
        assert!(err.is_engine_failure());
    }

    #[test]
    fn test_wrong_sample_count_is_malformed() {
        let engine = FakeEngine::new()
            .with_binding("AAAA", 0.5)
            .with_sample_override(7);
        let err = process_chunk(&chunk(&["AAAA"]), &engine, &settings()).unwrap_err();
        assert!(err.is_engine_failure());
    }

    #[test]
    fn test_complexes_without_switch_are_skipped() {
        let switch = test_switch();
        let tube = TubeResult {
            complexes: vec![ComplexRecord {
                strands: vec!["GGGG".to_string()],
                concentration: 1e-7,
                structures: vec!["....".to_string(); 3],
            }],
        };
        let stats = reduce_tube(&tube, &switch, 3).unwrap();
        assert_eq!(stats, TubeStatistics::default());
    }

    #[test]
    fn test_strand_count_mismatch_is_malformed() {
        let switch = test_switch();
        let open = ".".repeat(switch.len());
        let tube = TubeResult {
            complexes: vec![ComplexRecord {
                strands: vec![switch.sequence().to_string(), "GGGG".to_string()],
                concentration: 1e-7,
                structures: vec![open; 2],
            }],
        };
        assert!(reduce_tube(&tube, &switch, 2).unwrap_err().is_engine_failure());
    }

    #[test]
    fn test_switch_dimer_counts_both_copies() {
        let switch = test_switch();
        let open = ".".repeat(switch.len());
        let closed = "(".repeat(switch.len());
        let tube = TubeResult {
            complexes: vec![ComplexRecord {
                strands: vec![switch.sequence().to_string(), switch.sequence().to_string()],
                concentration: switch.concentration(),
                structures: vec![format!("{open}+{closed}"), format!("{open}+{open}")],
            }],
        };
        let stats = reduce_tube(&tube, &switch, 2).unwrap();
        assert!((stats.activation - 0.75).abs() < 1e-12);
    }
}
