use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThToolsError {
    /// Bad inputs detected before any simulation is dispatched.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The simulation engine failed or returned unusable data for a chunk.
    #[error("simulation engine failure: {0}")]
    EngineFailure(String),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ThToolsError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::EngineFailure(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_engine_failure(&self) -> bool {
        matches!(self, Self::EngineFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, ThToolsError>;
