use crate::error::Result;
use thtools_protocol::{ThermoModel, TubeResult, TubeSpec};

/// A thermodynamic structure-sampling engine.
pub trait SimulationEngine: Send + Sync {
    // One result per tube, in input order.
    fn simulate(
        &self,
        tubes: &[TubeSpec],
        n_samples: usize,
        model: &ThermoModel,
    ) -> Result<Vec<TubeResult>>;

    fn name(&self) -> &str {
        "engine"
    }
}
