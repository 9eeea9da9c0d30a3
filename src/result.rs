use crate::error::{Result, ThToolsError};
use crate::specificity::estimate;
use crate::tubes::TriggerSets;
use crate::worker::PerTubeStatistics;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::ops::Range;
use thtools_protocol::ThermoModel;

pub const DATE_FORMAT: &str = "%b %-d %Y at %H:%M:%S";

/// Echo of the configuration a result was produced with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub switch: String,
    pub switch_concentration: f64,
    pub rbs: Range<usize>,
    pub aug: usize,
    pub const_rna: Vec<(String, f64)>,
    pub model: ThermoModel,
    pub max_size: usize,
    pub n_samples: usize,
    pub n_workers: usize,
    pub n_chunks: usize,
    pub runtime_s: f64,
}

impl RunMetadata {
    fn pairs(&self) -> Vec<(String, String)> {
        let const_rna = if self.const_rna.is_empty() {
            "none".to_string()
        } else {
            self.const_rna
                .iter()
                .map(|(s, c)| format!("{s} ({c} M)"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        vec![
            ("Toehold switch".to_string(), self.switch.clone()),
            ("Switch concentration /M".to_string(), self.switch_concentration.to_string()),
            (
                "RBS slice".to_string(),
                format!("{}..{}", self.rbs.start, self.rbs.end),
            ),
            ("AUG position".to_string(), self.aug.to_string()),
            ("Constant RNAs".to_string(), const_rna),
            ("Material".to_string(), self.model.material.clone()),
            ("Ensemble".to_string(), self.model.ensemble.clone()),
            ("Temperature /°C".to_string(), self.model.celsius.to_string()),
            ("Na+ /M".to_string(), self.model.sodium.to_string()),
            ("Mg++ /M".to_string(), self.model.magnesium.to_string()),
            ("Max complex size".to_string(), self.max_size.to_string()),
            ("Samples per complex".to_string(), self.n_samples.to_string()),
            ("Workers".to_string(), self.n_workers.to_string()),
            ("Chunks".to_string(), self.n_chunks.to_string()),
            ("Runtime /s".to_string(), format!("{:.3}", self.runtime_s)),
        ]
    }
}

/// Statistics of a completed run, one entry per trigger set.
///
/// A run without trigger sets reports a single row with no triggers.
#[derive(Debug, Clone, Serialize)]
pub struct ToeholdResult {
    trigger_sets: TriggerSets,
    names: Option<Vec<Vec<String>>>,
    stats: PerTubeStatistics,
    specificity: f64,
    specificity_se: f64,
    target: usize,
    meta: RunMetadata,
    #[serde(skip)]
    created: DateTime<Local>,
    name: Option<String>,
}

impl ToeholdResult {
    pub fn new(
        trigger_sets: TriggerSets,
        names: Option<Vec<Vec<String>>>,
        stats: PerTubeStatistics,
        meta: RunMetadata,
    ) -> Result<Self> {
        let expected_rows = trigger_sets.len().max(1);
        if stats.len() != expected_rows {
            return Err(ThToolsError::engine(format!(
                "{} statistics rows for {expected_rows} trigger sets",
                stats.len()
            )));
        }
        if let Some(names) = &names {
            if names.len() != trigger_sets.len() {
                return Err(ThToolsError::config(format!(
                    "{} names for {} trigger sets",
                    names.len(),
                    trigger_sets.len()
                )));
            }
        }
        let estimate = estimate(&stats.activation, &stats.activation_se)
            .ok_or_else(|| ThToolsError::engine("Run produced no statistics"))?;
        Ok(Self {
            trigger_sets,
            names,
            stats,
            specificity: estimate.value,
            specificity_se: estimate.se,
            target: estimate.target,
            meta,
            created: Local::now(),
            name: None,
        })
    }

    /// Rows of `self` followed by rows of `other`, with specificity recomputed.
    ///
    /// Both results must come from the same configuration; metadata is kept
    /// from `self` with the runtimes added.
    pub fn concat(&self, other: &Self) -> Result<Self> {
        if self.is_isolated() || other.is_isolated() {
            return Err(ThToolsError::config(
                "Results of a switch tested without triggers cannot be joined",
            ));
        }
        let names = match (&self.names, &other.names) {
            (Some(a), Some(b)) => Some(a.iter().chain(b).cloned().collect()),
            (None, None) => None,
            _ => {
                return Err(ThToolsError::config(
                    "Cannot join a named result with an unnamed one",
                ));
            }
        };
        let trigger_sets = self.trigger_sets.concat(&other.trigger_sets)?;
        let mut stats = self.stats.clone();
        stats.extend(&other.stats);
        let mut meta = self.meta.clone();
        meta.runtime_s += other.meta.runtime_s;
        let mut ret = Self::new(trigger_sets, names, stats, meta)?;
        ret.name = self.name.clone();
        Ok(ret)
    }

    pub fn is_isolated(&self) -> bool {
        self.trigger_sets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn trigger_sets(&self) -> Vec<Vec<String>> {
        if self.is_isolated() {
            vec![vec![]]
        } else {
            self.trigger_sets.triggers().to_vec()
        }
    }

    pub fn trigger_set(&self, row: usize) -> &[String] {
        self.trigger_sets
            .triggers()
            .get(row)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn concentration_sets(&self) -> &[Vec<f64>] {
        self.trigger_sets.concentrations()
    }

    pub fn names(&self) -> Option<&[Vec<String>]> {
        self.names.as_deref()
    }

    pub fn row_name(&self, row: usize) -> Option<String> {
        self.names
            .as_ref()
            .and_then(|names| names.get(row))
            .map(|n| n.join("+"))
    }

    pub fn statistics(&self) -> &PerTubeStatistics {
        &self.stats
    }

    pub fn activation(&self) -> &[f64] {
        &self.stats.activation
    }

    pub fn rbs_unbinding(&self) -> &[f64] {
        &self.stats.rbs_unbinding
    }

    pub fn aug_unbinding(&self) -> &[f64] {
        &self.stats.aug_unbinding
    }

    pub fn post_aug_unbinding(&self) -> &[f64] {
        &self.stats.post_aug_unbinding
    }

    pub fn activation_se(&self) -> &[f64] {
        &self.stats.activation_se
    }

    pub fn specificity(&self) -> f64 {
        self.specificity
    }

    pub fn specificity_se(&self) -> f64 {
        self.specificity_se
    }

    pub fn target_index(&self) -> usize {
        self.target
    }

    pub fn target(&self) -> &[String] {
        self.trigger_set(self.target)
    }

    pub fn target_name(&self) -> Option<String> {
        self.row_name(self.target)
    }

    pub fn meta(&self) -> &RunMetadata {
        &self.meta
    }

    pub fn created(&self) -> DateTime<Local> {
        self.created
    }

    pub fn date(&self) -> String {
        self.created.format(DATE_FORMAT).to_string()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    /// Metadata lines shown above exported tables.
    pub fn meta_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![];
        if let Some(name) = &self.name {
            pairs.push(("Name".to_string(), name.clone()));
        }
        pairs.extend(self.meta.pairs());
        pairs.push((
            "Specificity %".to_string(),
            (self.specificity * 100.0).to_string(),
        ));
        pairs.push((
            "Specificity SE".to_string(),
            (self.specificity_se * 100.0).to_string(),
        ));
        if let Some(name) = self.target_name() {
            pairs.push(("Target name".to_string(), name));
        }
        pairs.push(("Target sequence".to_string(), self.target().join("+")));
        pairs
    }
}

impl PartialEq for ToeholdResult {
    /// Same rows and statistics; timestamps and runtimes are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.trigger_sets == other.trigger_sets
            && self.names == other.names
            && self.stats == other.stats
            && self.specificity.to_bits() == other.specificity.to_bits()
            && self.specificity_se.to_bits() == other.specificity_se.to_bits()
            && self.target == other.target
    }
}
