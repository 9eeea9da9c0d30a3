use crate::error::{Result, ThToolsError};
use crate::switch::normalized_rna;
use serde::Serialize;
use std::ops::Range;

/// RNAs added to every tube at a fixed concentration, such as decoys or co-factors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstantBackground {
    strands: Vec<(String, f64)>,
}

impl ConstantBackground {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a strand; a repeated sequence replaces the earlier concentration.
    pub fn insert(&mut self, sequence: &str, concentration: f64) -> Result<()> {
        let sequence = normalized_rna(sequence);
        if sequence.is_empty() {
            return Err(ThToolsError::config("Constant RNA sequence is empty"));
        }
        check_concentration(concentration, "Constant RNA")?;
        match self.strands.iter_mut().find(|(s, _)| *s == sequence) {
            Some(entry) => entry.1 = concentration,
            None => self.strands.push((sequence, concentration)),
        }
        Ok(())
    }

    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut ret = Self::new();
        for (sequence, concentration) in pairs {
            ret.insert(sequence.as_ref(), concentration)?;
        }
        Ok(ret)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.strands.iter().map(|(s, c)| (s.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.strands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strands.is_empty()
    }
}

/// The trigger matrix paired element-wise with its concentration matrix.
///
/// Each row is one combination of triggers simulated together in one tube.
/// All rows have the same width.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriggerSets {
    triggers: Vec<Vec<String>>,
    concentrations: Vec<Vec<f64>>,
}

impl TriggerSets {
    pub fn new(triggers: Vec<Vec<String>>, concentrations: Vec<Vec<f64>>) -> Result<Self> {
        if triggers.len() != concentrations.len() {
            return Err(ThToolsError::config(format!(
                "Trigger sets have {} rows but concentration sets have {}",
                triggers.len(),
                concentrations.len()
            )));
        }
        let width = triggers.first().map(Vec::len).unwrap_or(0);
        for (row, (seqs, concs)) in triggers.iter().zip(&concentrations).enumerate() {
            if seqs.len() != width {
                return Err(ThToolsError::config(format!(
                    "Trigger set {row} has {} triggers, expected {width}",
                    seqs.len()
                )));
            }
            if concs.len() != seqs.len() {
                return Err(ThToolsError::config(format!(
                    "Trigger set {row} has {} triggers but {} concentrations",
                    seqs.len(),
                    concs.len()
                )));
            }
            for &c in concs {
                check_concentration(c, &format!("Trigger set {row}"))?;
            }
        }
        if !triggers.is_empty() && width == 0 {
            return Err(ThToolsError::config("Trigger sets must hold at least one trigger"));
        }
        let triggers = triggers
            .into_iter()
            .map(|row| row.iter().map(|s| normalized_rna(s)).collect())
            .collect();
        Ok(Self {
            triggers,
            concentrations,
        })
    }

    pub fn uniform(triggers: &[Vec<String>], concentration: f64) -> Result<Self> {
        let concentrations = triggers
            .iter()
            .map(|row| vec![concentration; row.len()])
            .collect();
        Self::new(triggers.to_vec(), concentrations)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn width(&self) -> usize {
        self.triggers.first().map(Vec::len).unwrap_or(0)
    }

    pub fn triggers(&self) -> &[Vec<String>] {
        &self.triggers
    }

    pub fn concentrations(&self) -> &[Vec<f64>] {
        &self.concentrations
    }

    pub fn row(&self, index: usize) -> Option<(&[String], &[f64])> {
        Some((
            self.triggers.get(index)?.as_slice(),
            self.concentrations.get(index)?.as_slice(),
        ))
    }

    pub fn slice(&self, rows: Range<usize>) -> Self {
        Self {
            triggers: self.triggers[rows.clone()].to_vec(),
            concentrations: self.concentrations[rows].to_vec(),
        }
    }

    pub fn concat(&self, other: &Self) -> Result<Self> {
        if !self.is_empty() && !other.is_empty() && self.width() != other.width() {
            return Err(ThToolsError::config(format!(
                "Cannot join trigger sets of width {} and {}",
                self.width(),
                other.width()
            )));
        }
        let mut ret = self.clone();
        ret.triggers.extend(other.triggers.iter().cloned());
        ret.concentrations
            .extend(other.concentrations.iter().cloned());
        Ok(ret)
    }
}

fn check_concentration(concentration: f64, what: &str) -> Result<()> {
    if concentration.is_finite() && concentration > 0.0 {
        Ok(())
    } else {
        Err(ThToolsError::config(format!(
            "{what}: concentrations must be positive, got {concentration}"
        )))
    }
}

/// Splits `n_rows` into `n_chunks` contiguous ranges, larger ones first, empty ones dropped.
pub fn chunk_ranges(n_rows: usize, n_chunks: usize) -> Vec<Range<usize>> {
    let n_chunks = n_chunks.max(1);
    let base = n_rows / n_chunks;
    let extra = n_rows % n_chunks;
    let mut ret = Vec::with_capacity(n_chunks.min(n_rows));
    let mut start = 0;
    for i in 0..n_chunks {
        let size = base + usize::from(i < extra);
        if size == 0 {
            continue;
        }
        ret.push(start..start + size);
        start += size;
    }
    ret
}
