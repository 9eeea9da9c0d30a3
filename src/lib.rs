pub mod about;
pub mod autoconfig;
pub mod celsius_range;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod pool;
pub mod reducer;
pub mod result;
pub mod sampler;
pub mod specificity;
pub mod switch;
pub mod tubes;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use autoconfig::{ASSUMED_STRAND_CONC, AutoconfigOptions, autoconfig};
pub use celsius_range::{CelsiusRangeResult, CelsiusRangeTest};
pub use engine::SimulationEngine;
pub use error::{Result, ThToolsError};
pub use export::{ExportFormat, TableExport};
pub use orchestrator::{ChunkProgress, ChunkStream, RunOptions, RunParams, ToeholdTest};
pub use result::{RunMetadata, ToeholdResult};
pub use switch::{SwitchConfig, find_rbs};
pub use thtools_protocol::ThermoModel;
pub use tubes::{ConstantBackground, TriggerSets};
