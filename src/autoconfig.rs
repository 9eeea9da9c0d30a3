//! Quick configuration of a [`ToeholdTest`] where every strand shares one concentration.

use crate::engine::SimulationEngine;
use crate::error::{Result, ThToolsError};
use crate::orchestrator::ToeholdTest;
use crate::switch::SwitchConfig;
use crate::tubes::{ConstantBackground, TriggerSets};
use itertools::Itertools;
use std::sync::Arc;
use thtools_protocol::ThermoModel;

/// 100 nM, used for the switch, every trigger and every constant RNA.
pub const ASSUMED_STRAND_CONC: f64 = 1e-7;

/// Every `r`-combination of `items`, in lexicographic index order.
pub fn combinations<T: Clone>(items: &[T], r: usize) -> Vec<Vec<T>> {
    items.iter().cloned().combinations(r).collect()
}

#[derive(Debug, Clone)]
pub struct AutoconfigOptions {
    /// Triggers simulated together in one tube.
    pub set_size: usize,
    /// One name per trigger; combined the same way as the triggers.
    pub names: Option<Vec<String>>,
    pub const_rna: Vec<String>,
    pub model: ThermoModel,
}

impl Default for AutoconfigOptions {
    fn default() -> Self {
        Self {
            set_size: 1,
            names: None,
            const_rna: vec![],
            model: ThermoModel::default(),
        }
    }
}

/// Builds a test of `ths` against all `set_size`-combinations of `triggers`.
///
/// The RBS slice is found from its sequence (last occurrence wins). An empty
/// name list counts as no names.
pub fn autoconfig(
    ths: &str,
    rbs: &str,
    triggers: &[String],
    options: AutoconfigOptions,
    engine: Arc<dyn SimulationEngine>,
) -> Result<ToeholdTest> {
    let switch = SwitchConfig::with_rbs_sequence(ths, ASSUMED_STRAND_CONC, rbs)?;
    if options.set_size == 0 {
        return Err(ThToolsError::config("set_size must be at least 1"));
    }
    if !triggers.is_empty() && options.set_size > triggers.len() {
        return Err(ThToolsError::config(format!(
            "set_size {} exceeds the {} triggers given",
            options.set_size,
            triggers.len()
        )));
    }
    let trigger_sets = if triggers.is_empty() {
        TriggerSets::empty()
    } else {
        TriggerSets::uniform(
            &combinations(triggers, options.set_size),
            ASSUMED_STRAND_CONC,
        )?
    };
    let const_rna = ConstantBackground::from_pairs(
        options
            .const_rna
            .iter()
            .map(|rna| (rna, ASSUMED_STRAND_CONC)),
    )?;
    log::info!(
        "autoconfig: {} triggers in sets of {} give {} trigger sets",
        triggers.len(),
        options.set_size,
        trigger_sets.len()
    );
    let test = ToeholdTest::new(switch, trigger_sets, const_rna, options.model, engine);
    match options.names {
        Some(names) if !names.is_empty() => {
            if names.len() != triggers.len() {
                return Err(ThToolsError::config(format!(
                    "{} names given for {} triggers",
                    names.len(),
                    triggers.len()
                )));
            }
            test.with_names(combinations(&names, options.set_size))
        }
        _ => Ok(test),
    }
}
