//! Executor configuration.

use crate::error::PipelineError;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Configuration for running a chain of stages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of every hand-off channel between stages.
    ///
    /// `None` = unbounded, `Some(0)` = rendezvous (sender waits for the receiver).
    pub channel_capacity: Option<usize>,
    /// Maximum items a stage processes at once. `None` = no limit.
    pub max_in_flight: Option<usize>,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Reject settings that could never make progress
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_in_flight == Some(0) {
            return Err(PipelineError::Config(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Create one hand-off channel as configured
    pub(crate) fn channel<T>(&self) -> (Sender<T>, Receiver<T>) {
        match self.channel_capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        }
    }
}
