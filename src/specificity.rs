/// Specificity of the best trigger set over the runner-up, with its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Specificity {
    pub value: f64,
    /// `f64::INFINITY` when the interval is degenerate.
    pub se: f64,
    /// Row of the highest activation.
    pub target: usize,
    pub runner_up: Option<usize>,
}

/// Highest and second-highest entries in one pass; ties keep the first-seen maximum.
fn top_two(values: &[f64]) -> Option<(usize, Option<usize>)> {
    let mut best: Option<usize> = None;
    let mut second: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            None => best = Some(i),
            Some(b) if v > values[b] => {
                second = best;
                best = Some(i);
            }
            Some(_) => {
                if second.is_none_or(|s| v > values[s]) {
                    second = Some(i);
                }
            }
        }
    }
    best.map(|b| (b, second))
}

/// Specificity `1 - a2/a1` and half the width of its interval.
///
/// With a single trigger set the runner-up counts as zero activation with
/// zero error. Returns `None` for empty input.
pub fn estimate(activation: &[f64], activation_se: &[f64]) -> Option<Specificity> {
    let (target, runner_up) = top_two(activation)?;
    let a1 = activation[target];
    let e1 = activation_se.get(target).copied().unwrap_or(0.0);
    let (a2, e2) = match runner_up {
        Some(i) => (activation[i], activation_se.get(i).copied().unwrap_or(0.0)),
        None => (0.0, 0.0),
    };
    if a1 <= 0.0 {
        // nothing activates the switch, so no trigger set is preferred
        return Some(Specificity {
            value: 0.0,
            se: f64::INFINITY,
            target,
            runner_up,
        });
    }
    let value = 1.0 - a2 / a1;
    let upper = 1.0 - (a2 - e2) / (a1 + e1);
    let lower = 1.0 - (a2 + e2) / (a1 - e1);
    let se = (upper - lower).abs() / 2.0;
    let se = if (0.0..=1.0).contains(&se) {
        se
    } else {
        f64::INFINITY
    };
    Some(Specificity {
        value,
        se,
        target,
        runner_up,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_sets_without_error() {
        let s = estimate(&[0.9, 0.1], &[0.0, 0.0]).unwrap();
        assert!((s.value - (1.0 - 0.1 / 0.9)).abs() < 1e-12);
        assert!((s.value - 0.8889).abs() < 1e-4);
        assert_eq!(s.se, 0.0);
        assert_eq!(s.target, 0);
        assert_eq!(s.runner_up, Some(1));
    }

    #[test]
    fn test_single_set_is_fully_specific() {
        let s = estimate(&[0.5], &[0.05]).unwrap();
        assert_eq!(s.value, 1.0);
        assert_eq!(s.se, 0.0);
        assert_eq!(s.runner_up, None);
    }

    #[test]
    fn test_interval_half_width() {
        let s = estimate(&[0.2, 0.8, 0.4], &[0.01, 0.1, 0.05]).unwrap();
        assert_eq!(s.target, 1);
        assert_eq!(s.runner_up, Some(2));
        let upper: f64 = 1.0 - (0.4 - 0.05) / (0.8 + 0.1);
        let lower: f64 = 1.0 - (0.4 + 0.05) / (0.8 - 0.1);
        assert!((s.se - (upper - lower).abs() / 2.0).abs() < 1e-12);
        assert!((s.value - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_denominator_gives_infinite_error() {
        // a1 - e1 is negative
        let s = estimate(&[0.3, 0.2], &[0.31, 0.0]).unwrap();
        assert!(s.value.is_finite());
        assert_eq!(s.se, f64::INFINITY);
        // a1 - e1 is tiny
        let s = estimate(&[0.3, 0.2], &[0.29, 0.01]).unwrap();
        assert_eq!(s.se, f64::INFINITY);
        // a1 - e1 is zero
        let s = estimate(&[0.3, 0.2], &[0.3, 0.0]).unwrap();
        assert_eq!(s.se, f64::INFINITY);
    }

    #[test]
    fn test_ties_keep_first_maximum() {
        let s = estimate(&[0.4, 0.7, 0.7, 0.1], &[0.0; 4]).unwrap();
        assert_eq!(s.target, 1);
        assert_eq!(s.runner_up, Some(2));
        assert_eq!(s.value, 0.0);
    }

    #[test]
    fn test_runner_up_found_after_best() {
        let s = estimate(&[0.9, 0.1, 0.3], &[0.0; 3]).unwrap();
        assert_eq!(s.runner_up, Some(2));
    }

    #[test]
    fn test_zero_activation() {
        let s = estimate(&[0.0, 0.0], &[0.0, 0.0]).unwrap();
        assert_eq!(s.value, 0.0);
        assert_eq!(s.se, f64::INFINITY);
        assert!(estimate(&[], &[]).is_none());
    }
}
