//! JSON run configuration, as read by the command line tool.
//!
//! A config gives triggers one of two ways. A flat `triggers` list is combined
//! into sets of `set_size` and every strand is put at
//! [`ASSUMED_STRAND_CONC`]. Explicit `trigger_sets` may carry their own
//! `concentration_sets`, switch concentration and RBS slice.

use crate::autoconfig::{ASSUMED_STRAND_CONC, AutoconfigOptions, autoconfig};
use crate::celsius_range::CelsiusRangeTest;
use crate::engine::SimulationEngine;
use crate::error::{Result, ThToolsError};
use crate::orchestrator::{RunOptions, RunParams, ToeholdTest};
use crate::sampler::ProcessSampler;
use crate::switch::SwitchConfig;
use crate::tubes::{ConstantBackground, TriggerSets};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use thtools_protocol::ThermoModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstRnaSpec {
    pub sequence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// Overrides `THTOOLS_SAMPLER_BIN`.
    pub executable: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToeholdConfig {
    /// Annotation copied onto the result.
    pub name: Option<String>,
    pub switch: String,
    pub switch_concentration: Option<f64>,
    pub rbs: Option<String>,
    /// Half-open `[start, end)` of the RBS, instead of `rbs`.
    pub rbs_slice: Option<[usize; 2]>,
    pub triggers: Vec<String>,
    pub set_size: usize,
    /// One per entry of `triggers`.
    pub names: Vec<String>,
    pub trigger_sets: Option<Vec<Vec<String>>>,
    pub concentration_sets: Option<Vec<Vec<f64>>>,
    /// One row per entry of `trigger_sets`.
    pub set_names: Option<Vec<Vec<String>>>,
    pub const_rna: Vec<ConstRnaSpec>,
    pub model: ThermoModel,
    pub run: RunParams,
    pub options: RunOptions,
    /// Temperatures for `crt`, in °C.
    pub celsius_range: Vec<f64>,
    pub sampler: SamplerSettings,
}

impl Default for ToeholdConfig {
    fn default() -> Self {
        Self {
            name: None,
            switch: String::new(),
            switch_concentration: None,
            rbs: None,
            rbs_slice: None,
            triggers: vec![],
            set_size: 1,
            names: vec![],
            trigger_sets: None,
            concentration_sets: None,
            set_names: None,
            const_rna: vec![],
            model: ThermoModel::default(),
            run: RunParams::default(),
            options: RunOptions::default(),
            celsius_range: vec![],
            sampler: SamplerSettings::default(),
        }
    }
}

impl ToeholdConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ThToolsError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| {
            ThToolsError::config(format!(
                "Could not parse config JSON '{}': {e}",
                path.display()
            ))
        })
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| ThToolsError::io(path, e))
    }

    /// The external sampler this config points at.
    pub fn engine(&self) -> Arc<dyn SimulationEngine> {
        let sampler = ProcessSampler::from_config(self.sampler.executable.as_deref())
            .with_args(self.sampler.args.clone());
        log::debug!("using sampler '{}'", sampler.executable());
        Arc::new(sampler)
    }

    fn switch(&self) -> Result<SwitchConfig> {
        let concentration = self.switch_concentration.unwrap_or(ASSUMED_STRAND_CONC);
        match (&self.rbs_slice, &self.rbs) {
            (Some([start, end]), _) => SwitchConfig::new(&self.switch, concentration, *start..*end),
            (None, Some(rbs)) => SwitchConfig::with_rbs_sequence(&self.switch, concentration, rbs),
            (None, None) => Err(ThToolsError::config("Config needs either rbs or rbs_slice")),
        }
    }

    fn const_rna(&self) -> Result<ConstantBackground> {
        ConstantBackground::from_pairs(self.const_rna.iter().map(|rna| {
            (
                rna.sequence.as_str(),
                rna.concentration.unwrap_or(ASSUMED_STRAND_CONC),
            )
        }))
    }

    fn flat_test(&self, engine: Arc<dyn SimulationEngine>) -> Result<ToeholdTest> {
        let rbs = self.rbs.as_deref().ok_or_else(|| {
            ThToolsError::config("A flat trigger list needs the RBS given as a sequence")
        })?;
        if self.switch_concentration.is_some()
            || self.rbs_slice.is_some()
            || self.const_rna.iter().any(|c| c.concentration.is_some())
        {
            return Err(ThToolsError::config(
                "A flat trigger list puts every strand at 100 nM; use trigger_sets instead",
            ));
        }
        let options = AutoconfigOptions {
            set_size: self.set_size,
            names: Some(self.names.clone()),
            const_rna: self.const_rna.iter().map(|c| c.sequence.clone()).collect(),
            model: self.model.clone(),
        };
        autoconfig(&self.switch, rbs, &self.triggers, options, engine)
    }

    fn explicit_test(
        &self,
        trigger_sets: &[Vec<String>],
        engine: Arc<dyn SimulationEngine>,
    ) -> Result<ToeholdTest> {
        let sets = match &self.concentration_sets {
            Some(concentrations) => {
                TriggerSets::new(trigger_sets.to_vec(), concentrations.clone())?
            }
            None => TriggerSets::uniform(trigger_sets, ASSUMED_STRAND_CONC)?,
        };
        let test = ToeholdTest::new(
            self.switch()?,
            sets,
            self.const_rna()?,
            self.model.clone(),
            engine,
        );
        match &self.set_names {
            Some(names) => test.with_names(names.clone()),
            None => Ok(test),
        }
    }

    /// Builds and validates the test; nothing is simulated.
    pub fn into_test(&self, engine: Arc<dyn SimulationEngine>) -> Result<ToeholdTest> {
        let test = match &self.trigger_sets {
            Some(sets) => {
                if !self.triggers.is_empty() {
                    return Err(ThToolsError::config(
                        "Give either triggers or trigger_sets, not both",
                    ));
                }
                self.explicit_test(sets, engine)?
            }
            None => self.flat_test(engine)?,
        };
        Ok(test.with_options(self.options))
    }

    pub fn into_celsius_range_test(
        &self,
        engine: Arc<dyn SimulationEngine>,
    ) -> Result<CelsiusRangeTest> {
        CelsiusRangeTest::new(self.into_test(engine)?, self.celsius_range.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEngine, TEST_RBS, TEST_THS};
    use std::io::Write;

    fn engine() -> Arc<dyn SimulationEngine> {
        Arc::new(FakeEngine::new())
    }

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_flat_config_uses_autoconfig() {
        let file = write_config(&format!(
            r#"{{
                "switch": "{TEST_THS}",
                "rbs": "{TEST_RBS}",
                "triggers": ["AAAA", "CCCC", "GGGG"],
                "names": ["a", "c", "g"],
                "set_size": 2,
                "run": {{ "n_samples": 50, "n_workers": 2 }},
                "options": {{ "verbose_timing": true }}
            }}"#
        ));
        let config = ToeholdConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.run.n_samples, 50);
        assert_eq!(config.run.max_size, 3);
        assert_eq!(config.run.chunks_per_worker, 1);
        let test = config.into_test(engine()).unwrap();
        assert_eq!(test.trigger_sets().len(), 3);
        assert_eq!(test.names().unwrap()[2], vec!["c".to_string(), "g".to_string()]);
        assert!(test.options().verbose_timing);
    }

    #[test]
    fn test_explicit_config() {
        let config = ToeholdConfig {
            switch: TEST_THS.to_string(),
            switch_concentration: Some(2e-7),
            rbs_slice: Some([34, 42]),
            trigger_sets: Some(vec![vec!["AAAA".to_string()], vec!["CCCC".to_string()]]),
            concentration_sets: Some(vec![vec![1e-6], vec![5e-7]]),
            const_rna: vec![ConstRnaSpec {
                sequence: "GGGG".to_string(),
                concentration: Some(3e-8),
            }],
            model: ThermoModel::nupack3(25.0),
            ..ToeholdConfig::default()
        };
        let test = config.into_test(engine()).unwrap();
        assert_eq!(test.switch().concentration(), 2e-7);
        assert_eq!(test.trigger_sets().concentrations()[1], vec![5e-7]);
        assert_eq!(test.const_rna().iter().next(), Some(("GGGG", 3e-8)));
        assert_eq!(test.model().celsius, 25.0);
    }

    #[test]
    fn test_invalid_configs() {
        let base = ToeholdConfig {
            switch: TEST_THS.to_string(),
            triggers: vec!["AAAA".to_string()],
            ..ToeholdConfig::default()
        };
        assert!(base.into_test(engine()).unwrap_err().is_configuration());

        let mixed = ToeholdConfig {
            rbs: Some(TEST_RBS.to_string()),
            switch_concentration: Some(1e-6),
            ..base.clone()
        };
        assert!(mixed.into_test(engine()).unwrap_err().is_configuration());

        let both = ToeholdConfig {
            rbs: Some(TEST_RBS.to_string()),
            trigger_sets: Some(vec![vec!["CCCC".to_string()]]),
            ..base.clone()
        };
        assert!(both.into_test(engine()).is_err());

        let no_range = ToeholdConfig {
            rbs: Some(TEST_RBS.to_string()),
            ..base
        };
        assert!(no_range.into_celsius_range_test(engine()).is_err());
    }

    #[test]
    fn test_load_errors() {
        let file = write_config("{ not json");
        assert!(
            ToeholdConfig::load_from_path(file.path())
                .unwrap_err()
                .is_configuration()
        );
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ToeholdConfig::load_from_path(&missing),
            Err(ThToolsError::Io { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ToeholdConfig {
            name: Some("screen".to_string()),
            switch: TEST_THS.to_string(),
            rbs: Some(TEST_RBS.to_string()),
            triggers: vec!["AAAA".to_string()],
            celsius_range: vec![20.0, 30.0],
            sampler: SamplerSettings {
                executable: Some("/opt/sampler".to_string()),
                args: vec!["--fast".to_string()],
            },
            ..ToeholdConfig::default()
        };
        config.save_to_path(&path).unwrap();
        let loaded = ToeholdConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
        let crt = loaded.into_celsius_range_test(engine()).unwrap();
        assert_eq!(crt.celsius_range(), &[20.0, 30.0]);
    }
}
