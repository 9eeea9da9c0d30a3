//! Contracts exchanged with a thermodynamic structure-sampling engine.
//!
//! A run hands the engine one [`SimulationRequest`] per chunk of trigger sets.
//! Every tube in the request gets exactly one [`TubeResult`] back, in the same
//! order. The engine is free to compute complexes however it likes; this crate
//! only fixes the shape of what goes in and what comes out.

use serde::{Deserialize, Serialize};

pub const PROTOCOL_SCHEMA: &str = "thtools.simulation.v1";

/// Offset between the Celsius and Kelvin scales.
pub const ZERO_CELSIUS_KELVIN: f64 = 273.15;

/// Thermodynamic conditions, passed through to the engine unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermoModel {
    pub material: String,
    pub ensemble: String,
    pub celsius: f64,
    /// Molar.
    pub sodium: f64,
    /// Molar.
    pub magnesium: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wobble: Option<bool>,
}

impl Default for ThermoModel {
    fn default() -> Self {
        Self {
            material: "rna".to_string(),
            ensemble: "stacking".to_string(),
            celsius: 37.0,
            sodium: 1.0,
            magnesium: 0.0,
            wobble: None,
        }
    }
}

impl ThermoModel {
    /// Parameter set mimicking the behaviour of the NUPACK 3 web server.
    pub fn nupack3(celsius: f64) -> Self {
        Self {
            material: "rna95-nupack3".to_string(),
            ensemble: "some-nupack3".to_string(),
            celsius,
            ..Self::default()
        }
    }

    pub fn kelvin(&self) -> f64 {
        self.celsius + ZERO_CELSIUS_KELVIN
    }

    pub fn with_celsius(&self, celsius: f64) -> Self {
        Self {
            celsius,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrandSpec {
    pub sequence: String,
    /// Molar.
    pub concentration: f64,
}

/// One reaction vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TubeSpec {
    pub strands: Vec<StrandSpec>,
    pub max_complex_size: usize,
}

impl TubeSpec {
    pub fn concentration_of(&self, sequence: &str) -> Option<f64> {
        self.strands
            .iter()
            .find(|s| s.sequence == sequence)
            .map(|s| s.concentration)
    }
}

/// A batch of tubes sampled under one model; the unit of work for one engine call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub schema: String,
    pub tubes: Vec<TubeSpec>,
    pub n_samples: usize,
    pub model: ThermoModel,
}

impl SimulationRequest {
    pub fn new(tubes: Vec<TubeSpec>, n_samples: usize, model: ThermoModel) -> Self {
        Self {
            schema: PROTOCOL_SCHEMA.to_string(),
            tubes,
            n_samples,
            model,
        }
    }
}

/// A complex found at equilibrium in one tube.
///
/// `strands` lists the strand sequences in the order the engine ordered them
/// within the complex. Each entry of `structures` is one Boltzmann sample in
/// dot-bracket notation with strands separated by `+`, following the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexRecord {
    pub strands: Vec<String>,
    /// Molar.
    pub concentration: f64,
    pub structures: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TubeResult {
    pub complexes: Vec<ComplexRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub tubes: Vec<TubeResult>,
}
