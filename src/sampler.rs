use crate::engine::SimulationEngine;
use crate::error::{Result, ThToolsError};
use std::{
    io::{self, ErrorKind, Write},
    process::{Command, Stdio},
    thread,
};
use thtools_protocol::{SimulationRequest, SimulationResponse, ThermoModel, TubeResult, TubeSpec};

pub const DEFAULT_SAMPLER_BIN: &str = "thtools-sampler";
pub const SAMPLER_ENV_BIN: &str = "THTOOLS_SAMPLER_BIN";

fn normalized_non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn resolve_sampler_executable(configured: Option<&str>) -> String {
    configured
        .and_then(normalized_non_empty)
        .or_else(|| {
            std::env::var(SAMPLER_ENV_BIN)
                .ok()
                .and_then(|v| normalized_non_empty(&v))
        })
        .unwrap_or_else(|| DEFAULT_SAMPLER_BIN.to_string())
}

#[derive(Debug, Clone)]
pub struct ProcessSampler {
    executable: String,
    args: Vec<String>,
}

impl ProcessSampler {
    pub fn new(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
            args: vec![],
        }
    }

    pub fn from_config(configured: Option<&str>) -> Self {
        Self::new(&resolve_sampler_executable(configured))
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    fn run(&self, request: &SimulationRequest) -> Result<SimulationResponse> {
        let payload = serde_json::to_vec(request)?;
        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    ThToolsError::engine(format!(
                        "Could not find sampler executable '{}'; install it or set {}",
                        self.executable, SAMPLER_ENV_BIN
                    ))
                } else {
                    ThToolsError::engine(format!(
                        "Could not run sampler '{}' with args [{}]: {e}",
                        self.executable,
                        self.args.join(" ")
                    ))
                }
            })?;
        let stdin = child.stdin.take();
        let (output, sent) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(&payload),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let sent = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("request writer panicked")));
            (output, sent)
        });
        let output = output.map_err(|e| {
            ThToolsError::engine(format!("Sampler '{}' did not finish: {e}", self.executable))
        })?;
        if !output.status.success() {
            return Err(ThToolsError::engine(format!(
                "Sampler command failed: {} {} (status={:?}, stderr='{}')",
                self.executable,
                self.args.join(" "),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        sent.map_err(|e| {
            ThToolsError::engine(format!("Could not send request to sampler: {e}"))
        })?;
        serde_json::from_slice(&output.stdout).map_err(|e| {
            ThToolsError::engine(format!(
                "Sampler '{}' returned malformed JSON: {e}",
                self.executable
            ))
        })
    }
}

impl SimulationEngine for ProcessSampler {
    fn simulate(
        &self,
        tubes: &[TubeSpec],
        n_samples: usize,
        model: &ThermoModel,
    ) -> Result<Vec<TubeResult>> {
        let request = SimulationRequest::new(tubes.to_vec(), n_samples, model.clone());
        log::debug!(
            "sending {} tubes to sampler '{}'",
            tubes.len(),
            self.executable
        );
        Ok(self.run(&request)?.tubes)
    }

    fn name(&self) -> &str {
        &self.executable
    }
}
