use crate::switch::{CODON_LEN, SwitchRegions};

/// Which functional regions of one switch strand are free in one sampled structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionExposure {
    pub rbs: bool,
    pub aug: bool,
    pub post_aug: bool,
}

impl RegionExposure {
    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.rbs && self.aug && self.post_aug
    }
}

#[inline(always)]
fn all_unpaired(region: Option<&[u8]>) -> bool {
    region.is_some_and(|r| r.iter().all(|&c| c == b'.'))
}

/// Classifies a dot-bracket structure of a single switch strand.
///
/// The downstream region counts as released while it closes no more pairs than
/// it opens: a surplus `)` pairs back into the start codon or upstream of it.
pub fn classify(structure: &str, regions: &SwitchRegions) -> RegionExposure {
    let bytes = structure.as_bytes();
    let aug_end = regions.aug + CODON_LEN;
    let rbs = all_unpaired(bytes.get(regions.rbs.clone()));
    let aug = all_unpaired(bytes.get(regions.aug..aug_end));
    let post_aug = match bytes.get(aug_end..) {
        Some(tail) => {
            let opening = tail.iter().filter(|&&c| c == b'(').count();
            let closing = tail.iter().filter(|&&c| c == b')').count();
            closing <= opening
        }
        None => true,
    };
    RegionExposure { rbs, aug, post_aug }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(rbs: std::ops::Range<usize>, aug: usize) -> SwitchRegions {
        SwitchRegions { rbs, aug }
    }

    #[test]
    fn test_rbs_paired() {
        let exposure = classify("..((.)).", &regions(2..5, 5));
        assert!(!exposure.rbs);
        assert!(!exposure.is_active());
    }

    #[test]
    fn test_rbs_free() {
        let exposure = classify("((.....))", &regions(2..5, 5));
        assert!(exposure.rbs);
        assert!(!exposure.aug);
    }

    #[test]
    fn test_fully_open_switch_is_active() {
        let exposure = classify("..........", &regions(1..4, 5));
        assert_eq!(
            exposure,
            RegionExposure {
                rbs: true,
                aug: true,
                post_aug: true
            }
        );
        assert!(exposure.is_active());
    }

    #[test]
    fn test_downstream_surplus_closing_bracket() {
        // tail after the AUG is ")."
        let exposure = classify("......).", &regions(0..2, 3));
        assert!(exposure.aug);
        assert!(!exposure.post_aug);
    }

    #[test]
    fn test_downstream_empty_tail_is_exposed() {
        let exposure = classify(".......", &regions(0..2, 4));
        assert!(exposure.post_aug);
        assert!(exposure.is_active());
    }

    #[test]
    fn test_downstream_balanced_or_opening_surplus_is_exposed() {
        assert!(classify("....(.)", &regions(0..1, 1)).post_aug);
        assert!(classify("....((.", &regions(0..1, 1)).post_aug);
    }
}
