//! Running one [`ToeholdTest`] across a range of temperatures.

use crate::error::{Result, ThToolsError};
use crate::export::{ResultTable, TableExport, number, percent};
use crate::orchestrator::{RunParams, ToeholdTest};
use crate::result::{DATE_FORMAT, ToeholdResult};
use chrono::{DateTime, Local};
use std::vec::IntoIter;

/// Metadata keys that vary per temperature and are left out of the sweep header.
const PER_RUN_KEYS: [&str; 6] = [
    "Temperature /°C",
    "Specificity %",
    "Specificity SE",
    "Runtime /s",
    "Target name",
    "Target sequence",
];

const MAX_TEMPERATURES: usize = 10_000;

#[derive(Debug, Clone)]
pub struct CelsiusRangeTest {
    test: ToeholdTest,
    celsius_range: Vec<f64>,
}

impl CelsiusRangeTest {
    pub fn new(test: ToeholdTest, celsius_range: Vec<f64>) -> Result<Self> {
        if celsius_range.is_empty() {
            return Err(ThToolsError::config("Temperature range is empty"));
        }
        if let Some(bad) = celsius_range.iter().find(|c| !c.is_finite()) {
            return Err(ThToolsError::config(format!("Invalid temperature {bad}")));
        }
        Ok(Self {
            test,
            celsius_range,
        })
    }

    /// Evenly spaced temperatures from `start` up to and including `stop` when it falls on a step.
    pub fn stepped(test: ToeholdTest, start: f64, stop: f64, step: f64) -> Result<Self> {
        if step.is_nan() || step <= 0.0 || stop < start {
            return Err(ThToolsError::config(format!(
                "Cannot step from {start} to {stop} by {step}"
            )));
        }
        let steps = ((stop - start) / step + 1e-9).floor();
        if !steps.is_finite() || steps >= MAX_TEMPERATURES as f64 {
            return Err(ThToolsError::config(format!(
                "Too many temperatures stepping from {start} to {stop} by {step}"
            )));
        }
        let n = steps as usize + 1;
        Self::new(test, (0..n).map(|i| start + i as f64 * step).collect())
    }

    pub fn celsius_range(&self) -> &[f64] {
        &self.celsius_range
    }

    pub fn test(&self) -> &ToeholdTest {
        &self.test
    }

    /// The wrapped test with its model moved to `celsius`.
    pub fn test_at(&self, celsius: f64) -> ToeholdTest {
        let model = self.test.model().with_celsius(celsius);
        self.test.clone().with_model(model)
    }

    /// Yields one result per temperature, running each only when asked for.
    pub fn generate(&self, params: &RunParams) -> CelsiusRangeStream {
        CelsiusRangeStream {
            range: self.clone(),
            params: params.clone(),
            pending: self.celsius_range.clone().into_iter(),
            results: Vec::with_capacity(self.celsius_range.len()),
            failed: false,
        }
    }

    pub fn run(&self, params: &RunParams) -> Result<CelsiusRangeResult> {
        self.generate(params).into_result()
    }
}

pub struct CelsiusRangeStream {
    range: CelsiusRangeTest,
    params: RunParams,
    pending: IntoIter<f64>,
    results: Vec<ToeholdResult>,
    failed: bool,
}

impl CelsiusRangeStream {
    pub fn into_result(mut self) -> Result<CelsiusRangeResult> {
        while let Some(result) = self.next() {
            result?;
        }
        if self.failed {
            return Err(ThToolsError::engine("Temperature sweep already failed"));
        }
        CelsiusRangeResult::new(self.results, self.range.celsius_range)
    }
}

impl Iterator for CelsiusRangeStream {
    type Item = Result<ToeholdResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let celsius = self.pending.next()?;
        log::info!("running at {celsius} °C");
        match self.range.test_at(celsius).run(&self.params) {
            Ok(result) => {
                self.results.push(result.clone());
                Some(Ok(result))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Per-temperature statistics of one inferred target.
#[derive(Debug, Clone)]
pub struct CelsiusRangeResult {
    results: Vec<ToeholdResult>,
    celsius_range: Vec<f64>,
    targets: Vec<Vec<String>>,
    target_names: Vec<Option<String>>,
    inferred_target: Vec<String>,
    inferred_target_name: Option<String>,
    activation: Vec<f64>,
    rbs_unbinding: Vec<f64>,
    aug_unbinding: Vec<f64>,
    post_aug_unbinding: Vec<f64>,
    activation_se: Vec<f64>,
    specificity: Vec<f64>,
    specificity_se: Vec<f64>,
    created: DateTime<Local>,
}

/// Most frequent item; ties go to the one seen first.
fn mode(items: &[Vec<String>]) -> Option<&Vec<String>> {
    let mut best: Option<(&Vec<String>, usize)> = None;
    for item in items {
        let count = items.iter().filter(|other| *other == item).count();
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((item, count));
        }
    }
    best.map(|(item, _)| item)
}

impl CelsiusRangeResult {
    pub fn new(results: Vec<ToeholdResult>, celsius_range: Vec<f64>) -> Result<Self> {
        if results.len() != celsius_range.len() {
            return Err(ThToolsError::config(format!(
                "{} results for {} temperatures",
                results.len(),
                celsius_range.len()
            )));
        }
        let targets: Vec<Vec<String>> = results.iter().map(|r| r.target().to_vec()).collect();
        let inferred = mode(&targets)
            .cloned()
            .ok_or_else(|| ThToolsError::config("Temperature sweep has no results"))?;
        let mut ret = Self {
            target_names: results.iter().map(ToeholdResult::target_name).collect(),
            results,
            celsius_range,
            targets,
            inferred_target: vec![],
            inferred_target_name: None,
            activation: vec![],
            rbs_unbinding: vec![],
            aug_unbinding: vec![],
            post_aug_unbinding: vec![],
            activation_se: vec![],
            specificity: vec![],
            specificity_se: vec![],
            created: Local::now(),
        };
        ret.select_target(&inferred)?;
        Ok(ret)
    }

    /// Reports every temperature against `target`, which must have been the top
    /// trigger set at one of them.
    pub fn select_target(&mut self, target: &[String]) -> Result<()> {
        let index = self
            .targets
            .iter()
            .position(|t| t.as_slice() == target)
            .ok_or_else(|| {
                ThToolsError::config(format!(
                    "'{}' was not the target at any temperature",
                    target.join("+")
                ))
            })?;
        let mut activation = Vec::with_capacity(self.results.len());
        let mut rbs_unbinding = Vec::with_capacity(self.results.len());
        let mut aug_unbinding = Vec::with_capacity(self.results.len());
        let mut post_aug_unbinding = Vec::with_capacity(self.results.len());
        let mut activation_se = Vec::with_capacity(self.results.len());
        let mut specificity = Vec::with_capacity(self.results.len());
        let mut specificity_se = Vec::with_capacity(self.results.len());
        for (result, celsius) in self.results.iter().zip(&self.celsius_range) {
            let row = (0..result.len())
                .find(|&row| result.trigger_set(row) == target)
                .ok_or_else(|| {
                    ThToolsError::config(format!(
                        "'{}' is missing from the run at {celsius} °C",
                        target.join("+")
                    ))
                })?;
            activation.push(result.activation()[row]);
            rbs_unbinding.push(result.rbs_unbinding()[row]);
            aug_unbinding.push(result.aug_unbinding()[row]);
            post_aug_unbinding.push(result.post_aug_unbinding()[row]);
            activation_se.push(result.activation_se()[row]);
            if result.target() == target {
                specificity.push(result.specificity());
                specificity_se.push(result.specificity_se());
            } else {
                specificity.push(0.0);
                specificity_se.push(0.0);
            }
        }
        self.inferred_target = target.to_vec();
        self.inferred_target_name = self.target_names[index].clone();
        self.activation = activation;
        self.rbs_unbinding = rbs_unbinding;
        self.aug_unbinding = aug_unbinding;
        self.post_aug_unbinding = post_aug_unbinding;
        self.activation_se = activation_se;
        self.specificity = specificity;
        self.specificity_se = specificity_se;
        Ok(())
    }

    pub fn select_target_name(&mut self, name: &str) -> Result<()> {
        let target = self
            .target_names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .map(|i| self.targets[i].clone())
            .ok_or_else(|| {
                ThToolsError::config(format!("'{name}' was not the target at any temperature"))
            })?;
        self.select_target(&target)
    }

    pub fn results(&self) -> &[ToeholdResult] {
        &self.results
    }

    pub fn celsius_range(&self) -> &[f64] {
        &self.celsius_range
    }

    /// Top trigger set at each temperature.
    pub fn targets(&self) -> &[Vec<String>] {
        &self.targets
    }

    pub fn target_names(&self) -> &[Option<String>] {
        &self.target_names
    }

    pub fn inferred_target(&self) -> &[String] {
        &self.inferred_target
    }

    pub fn inferred_target_name(&self) -> Option<&str> {
        self.inferred_target_name.as_deref()
    }

    pub fn activation(&self) -> &[f64] {
        &self.activation
    }

    pub fn rbs_unbinding(&self) -> &[f64] {
        &self.rbs_unbinding
    }

    pub fn aug_unbinding(&self) -> &[f64] {
        &self.aug_unbinding
    }

    pub fn post_aug_unbinding(&self) -> &[f64] {
        &self.post_aug_unbinding
    }

    pub fn activation_se(&self) -> &[f64] {
        &self.activation_se
    }

    /// Zero wherever the inferred target was not the top trigger set.
    pub fn specificity(&self) -> &[f64] {
        &self.specificity
    }

    pub fn specificity_se(&self) -> &[f64] {
        &self.specificity_se
    }

    pub fn created(&self) -> DateTime<Local> {
        self.created
    }
}

impl PartialEq for CelsiusRangeResult {
    fn eq(&self, other: &Self) -> bool {
        self.celsius_range == other.celsius_range
            && self.results == other.results
            && self.inferred_target == other.inferred_target
    }
}

impl TableExport for CelsiusRangeResult {
    fn tabulate(&self, dp: Option<usize>) -> Result<ResultTable> {
        let named = self.target_names.iter().all(Option::is_some);
        let mut columns = vec!["Temperature /°C"];
        if named {
            columns.push("Target name");
        }
        columns.extend([
            "Target sequence",
            "Activation %",
            "Specificity %",
            "Activation SE %",
            "Specificity SE %",
        ]);
        let mut table = ResultTable::new(columns);
        for i in 0..self.results.len() {
            let mut cells = vec![number(self.celsius_range[i], None)];
            if named {
                cells.push(self.target_names[i].clone().unwrap_or_default());
            }
            cells.push(self.targets[i].join("+"));
            cells.push(percent(self.activation[i], dp));
            cells.push(percent(self.specificity[i], dp));
            cells.push(percent(self.activation_se[i], dp));
            cells.push(percent(self.specificity_se[i], dp));
            table.push_row(cells)?;
        }
        Ok(table)
    }

    fn date(&self) -> String {
        self.created.format(DATE_FORMAT).to_string()
    }

    fn meta_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .results
            .last()
            .map(|r| r.meta_pairs())
            .unwrap_or_default()
            .into_iter()
            .filter(|(k, _)| !PER_RUN_KEYS.contains(&k.as_str()))
            .collect();
        pairs.push((
            "Temperatures /°C".to_string(),
            self.celsius_range
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ));
        if let Some(name) = &self.inferred_target_name {
            pairs.push(("Target name".to_string(), name.clone()));
        }
        pairs.push(("Target sequence".to_string(), self.inferred_target.join("+")));
        pairs
    }
}
