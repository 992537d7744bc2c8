//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All events emitted while a pipeline runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Run-level events
    Pipeline(PipelineEvent),
    /// Events from a single stage worker
    Stage(StageEvent),
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// All stage workers are about to be launched
    Started { run_id: Uuid, stages: Vec<String> },
    /// Every stage drained and the output was collected
    Completed { summary: PipelineSummary },
    /// The run was cancelled before every stage drained
    Cancelled { run_id: Uuid, reason: String },
}

/// Events from a stage worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageEvent {
    /// The stage worker started reading its inbound channel
    Started { stage: String },
    /// One item finished processing inside the stage
    ItemCompleted(StageProgress),
    /// The stage returned and its outbound channel was closed
    Drained { report: StageReport },
    /// The stage failed; the run is being cancelled
    Failed { stage: String, message: String },
}

/// Progress information for one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    /// Stage name
    pub stage: String,
    /// Items completed so far by this stage
    pub completed: usize,
}

/// Per-stage accounting, produced once the stage has drained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name
    pub stage: String,
    /// Values read from the inbound channel
    pub items_in: usize,
    /// Values written to the outbound channel
    pub items_out: usize,
    /// Wall-clock time the worker ran
    pub duration_ms: u64,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub run_id: Uuid,
    /// Values collected from the final stage
    pub outputs: usize,
    /// Reports in pipeline order
    pub stages: Vec<StageReport>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for StageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} in, {} out ({} ms)",
            self.stage, self.items_in, self.items_out, self.duration_ms
        )
    }
}
