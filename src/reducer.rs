use crate::classifier::RegionExposure;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComplexContribution {
    pub activated: f64,
    pub rbs_unbound: f64,
    pub aug_unbound: f64,
    pub post_aug_unbound: f64,
    pub variance: f64,
}

/// Folds the classified samples of one complex into weighted exposures.
///
/// `exposures` holds one entry per switch strand per sample. Returns `None`
/// when the complex holds no switch strand or no samples were drawn.
pub fn reduce_complex(
    concentration: f64,
    n_samples: usize,
    occurrences: usize,
    exposures: &[RegionExposure],
) -> Option<ComplexContribution> {
    if occurrences == 0 || n_samples == 0 {
        return None;
    }
    let mut counts = [0usize; 4];
    for e in exposures {
        counts[0] += usize::from(e.is_active());
        counts[1] += usize::from(e.rbs);
        counts[2] += usize::from(e.aug);
        counts[3] += usize::from(e.post_aug);
    }
    let denominator = (occurrences * n_samples) as f64;
    let fraction = |count: usize| count as f64 / denominator;
    let p = fraction(counts[0]);
    Some(ComplexContribution {
        activated: p * concentration,
        rbs_unbound: fraction(counts[1]) * concentration,
        aug_unbound: fraction(counts[2]) * concentration,
        post_aug_unbound: fraction(counts[3]) * concentration,
        variance: p * (1.0 - p) / n_samples as f64 * concentration,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TubeTotals {
    pub activated: f64,
    pub rbs_unbound: f64,
    pub aug_unbound: f64,
    pub post_aug_unbound: f64,
    pub variance: f64,
}

impl TubeTotals {
    pub fn add(&mut self, c: &ComplexContribution) {
        self.activated += c.activated;
        self.rbs_unbound += c.rbs_unbound;
        self.aug_unbound += c.aug_unbound;
        self.post_aug_unbound += c.post_aug_unbound;
        self.variance += c.variance;
    }

    /// Scales to fractions of all switch molecules and converts variance to standard error.
    pub fn normalize(&self, switch_concentration: f64) -> TubeStatistics {
        TubeStatistics {
            activation: self.activated / switch_concentration,
            rbs_unbinding: self.rbs_unbound / switch_concentration,
            aug_unbinding: self.aug_unbound / switch_concentration,
            post_aug_unbinding: self.post_aug_unbound / switch_concentration,
            activation_se: (self.variance / switch_concentration).sqrt(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TubeStatistics {
    pub activation: f64,
    pub rbs_unbinding: f64,
    pub aug_unbinding: f64,
    pub post_aug_unbinding: f64,
    pub activation_se: f64,
}
