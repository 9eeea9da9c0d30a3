use crate::error::{Result, ThToolsError};
use serde::Serialize;
use std::ops::Range;

pub const START_CODON: &str = "AUG";
pub const CODON_LEN: usize = 3;

/// Upper-case RNA with whitespace removed and `T` read as `U`.
pub fn normalized_rna(sequence: &str) -> String {
    sequence
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c.to_ascii_uppercase() {
            'T' => 'U',
            other => other,
        })
        .collect()
}

/// Range of the last occurrence of `rbs` within `ths`.
///
/// With `mult_check`, more than one occurrence is rejected.
pub fn find_rbs(ths: &str, rbs: &str, mult_check: bool) -> Result<Range<usize>> {
    let ths = normalized_rna(ths);
    let rbs = normalized_rna(rbs);
    if rbs.is_empty() {
        return Err(ThToolsError::config("RBS sequence is empty"));
    }
    if mult_check && ths.matches(rbs.as_str()).count() > 1 {
        return Err(ThToolsError::config(format!(
            "Multiple RBS sequences '{rbs}' found in the switch"
        )));
    }
    let start = ths.rfind(rbs.as_str()).ok_or_else(|| {
        ThToolsError::config(format!("RBS sequence '{rbs}' not found in the switch"))
    })?;
    Ok(start..start + rbs.len())
}

/// First start codon at or after `from`.
pub fn find_start_codon(ths: &str, from: usize) -> Option<usize> {
    ths.get(from..)?.find(START_CODON).map(|i| i + from)
}

/// The toehold switch under test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchConfig {
    sequence: String,
    concentration: f64,
    rbs: Range<usize>,
    aug: usize,
}

impl SwitchConfig {
    pub fn new(sequence: &str, concentration: f64, rbs: Range<usize>) -> Result<Self> {
        let sequence = normalized_rna(sequence);
        if sequence.is_empty() {
            return Err(ThToolsError::config("Switch sequence is empty"));
        }
        if let Some(bad) = sequence.chars().find(|c| !matches!(c, 'A' | 'C' | 'G' | 'U')) {
            return Err(ThToolsError::config(format!(
                "Switch sequence contains '{bad}', expected only A, C, G and U"
            )));
        }
        if !(concentration.is_finite() && concentration > 0.0) {
            return Err(ThToolsError::config(format!(
                "Switch concentration must be positive, got {concentration}"
            )));
        }
        if rbs.start >= rbs.end || rbs.end > sequence.len() {
            return Err(ThToolsError::config(format!(
                "RBS slice {}..{} does not fit a switch of length {}",
                rbs.start,
                rbs.end,
                sequence.len()
            )));
        }
        let aug = find_start_codon(&sequence, rbs.end).ok_or_else(|| {
            ThToolsError::config(format!(
                "No {START_CODON} start codon found after the RBS slice {}..{}",
                rbs.start, rbs.end
            ))
        })?;
        Ok(Self {
            sequence,
            concentration,
            rbs,
            aug,
        })
    }

    pub fn with_rbs_sequence(sequence: &str, concentration: f64, rbs: &str) -> Result<Self> {
        let rbs = find_rbs(sequence, rbs, false)?;
        Self::new(sequence, concentration, rbs)
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn concentration(&self) -> f64 {
        self.concentration
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn rbs(&self) -> Range<usize> {
        self.rbs.clone()
    }

    pub fn aug(&self) -> usize {
        self.aug
    }

    pub fn regions(&self) -> SwitchRegions {
        SwitchRegions {
            rbs: self.rbs.clone(),
            aug: self.aug,
        }
    }
}

/// Region boundaries the structure classifier checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchRegions {
    pub rbs: Range<usize>,
    pub aug: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    const THS: &str =
        "UUAGCCGCUGUCACACGCACAGGGAUUUACAAAAAGAGGAGAGUAAAAUGCUGUGCGUGCACCAUAAAACGAACAUAGAC";

    #[test]
    fn test_find_rbs() {
        assert_eq!(find_rbs("AAGGUCACC", "GGU", true).unwrap(), 2..5);
        assert_eq!(find_rbs(THS, "agaggaga", false).unwrap(), 34..42);
    }

    #[test]
    fn test_find_rbs_takes_last_occurrence() {
        assert_eq!(find_rbs("GGUAAGGU", "GGU", false).unwrap(), 5..8);
        assert!(find_rbs("GGUAAGGU", "GGU", true).unwrap_err().is_configuration());
        assert!(find_rbs("AAAA", "GGU", false).is_err());
    }

    #[test]
    fn test_normalized_rna() {
        assert_eq!(normalized_rna("atg c\n"), "AUGC");
    }

    #[test]
    fn test_aug_position() {
        let switch = SwitchConfig::with_rbs_sequence(THS, 1e-7, "AGAGGAGA").unwrap();
        assert_eq!(switch.aug(), THS.find("AUG").unwrap());
        assert_eq!(switch.rbs(), 34..42);
    }

    #[test]
    fn test_aug_must_follow_rbs() {
        // the only AUG sits before the RBS
        let err = SwitchConfig::new("AUGCCAGGAGGCC", 1e-7, 5..10).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rejects_bad_switch_inputs() {
        assert!(SwitchConfig::new("", 1e-7, 0..1).is_err());
        assert!(SwitchConfig::new("GGAUGX", 1e-7, 0..2).is_err());
        assert!(SwitchConfig::new("GGAUG", 0.0, 0..2).is_err());
        assert!(SwitchConfig::new("GGAUG", 1e-7, 2..2).is_err());
        assert!(SwitchConfig::new("GGAUG", 1e-7, 0..9).is_err());
    }
}
