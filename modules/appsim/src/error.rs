use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

/// Failure kinds surfaced by the pipeline stages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("Historical data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Model inference failed: {0}")]
    ModelInference(String),

    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("Interaction #{index} on '{element_id}' rejected: {reason}")]
    InteractionRejected {
        index: usize,
        element_id: String,
        reason: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl SimError {
    /// Stable name of the failure kind, used in run records and exit output.
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::DataUnavailable(_) => "DataUnavailable",
            SimError::ModelInference(_) => "ModelInferenceError",
            SimError::TargetUnreachable(_) => "TargetUnreachable",
            SimError::InteractionRejected { .. } => "InteractionRejected",
            SimError::MalformedResponse(_) => "MalformedResponse",
            SimError::Render(_) => "RenderError",
        }
    }
}

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Generate,
    Simulate,
    Analyze,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Generate => "generate",
            Stage::Simulate => "simulate",
            Stage::Analyze => "analyze",
            Stage::Render => "render",
        };
        f.write_str(name)
    }
}

/// First failure of a run, tagged with the stage it happened in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} stage failed ({kind}): {source}", kind = .source.kind())]
pub struct PipelineError {
    pub stage: Stage,
    pub source: SimError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: SimError) -> Self {
        Self { stage, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_names_stage_and_kind() {
        let err = PipelineError::new(
            Stage::Simulate,
            SimError::InteractionRejected {
                index: 2,
                element_id: "btn9".to_string(),
                reason: "unknown element".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "simulate stage failed (InteractionRejected): Interaction #2 on 'btn9' rejected: unknown element"
        );
    }
}
