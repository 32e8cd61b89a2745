//! Domain error types.

use std::path::PathBuf;

/// Top-level error type for rltrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("stock name '{name}' not recognized, available options: {}", supported.join(", "))]
    UnknownInstrument { name: String, supported: Vec<String> },

    #[error("no data for {code}: {reason}")]
    DataUnavailable { code: String, reason: String },

    #[error("indicator preprocessing left no valid rows for {code} ({dropped} rows dropped)")]
    IndicatorComputation { code: String, dropped: usize },

    #[error("{} not found", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("failed to load {}: {reason}", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("simulation invariant violated at step {step}: {reason}")]
    InvariantViolation { step: usize, reason: String },

    #[error("decision source {source_name} failed: {reason}")]
    Decision { source_name: String, reason: String },

    #[error("broker unavailable: {reason}")]
    BrokerUnavailable { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    /// Stable taxonomy name used in structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::UnknownInstrument { .. } => "ConfigurationError",
            TraderError::DataUnavailable { .. } | TraderError::IndicatorComputation { .. } => {
                "DataUnavailable"
            }
            TraderError::ArtifactMissing { .. } => "ArtifactMissing",
            TraderError::ArtifactCorrupt { .. } => "ArtifactCorrupt",
            TraderError::InvariantViolation { .. } => "SimulationInvariantViolation",
            TraderError::Decision { .. } => "DecisionFailure",
            TraderError::BrokerUnavailable { .. } => "BrokerUnavailable",
            TraderError::Report { .. } | TraderError::Io(_) => "IoError",
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Report { .. } => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::UnknownInstrument { .. } => 2,
            TraderError::ArtifactMissing { .. } | TraderError::ArtifactCorrupt { .. } => 3,
            TraderError::DataUnavailable { .. } | TraderError::IndicatorComputation { .. } => 5,
            TraderError::InvariantViolation { .. } | TraderError::Decision { .. } => 6,
            TraderError::BrokerUnavailable { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
