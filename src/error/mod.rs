//! # Error Module
//!
//! Error types for the signal pipeline.
//!
//! ## Design Principles
//! - **Never panic** inside a stage - return errors instead
//! - **Include context** - which stage, which primitive, what went wrong
//! - **All-or-nothing** - one failing item fails the whole run, with no partial output

use thiserror::Error;

/// Top-level pipeline error
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Digest error: {0}")]
    Digest(#[from] DigestError),

    #[error("Stage '{stage}' failed: {reason}")]
    Stage { stage: String, reason: String },

    #[error("Stage '{stage}' panicked: {message}")]
    StagePanicked { stage: String, message: String },

    #[error("Pipeline was cancelled")]
    Cancelled,

    #[error("Failed to spawn worker for stage '{stage}': {source}")]
    Spawn {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Build a stage failure from any displayable reason
    pub fn stage(stage: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        PipelineError::Stage {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }

    /// True when this error only reports that the run was cancelled
    /// because something else failed first.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

/// Errors surfaced by a digest primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    #[error("{primitive} failed on input {input:?}: {reason}")]
    Failed {
        primitive: String,
        input: String,
        reason: String,
    },

    #[error("{primitive} was invoked while another call was in progress")]
    Overheated { primitive: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;
