//! Final reduction into one canonical value.

use crate::core::stage::{Stage, StageContext};
use crate::error::{PipelineError, Result};
use crossbeam_channel::{Receiver, Sender};
use rayon::prelude::*;
use tracing::debug;

/// Default separator between combined values
pub const COMBINE_SEPARATOR: &str = "_";

/// Sort `values` lexicographically and join them.
///
/// The result depends only on the multiset of values, never on the order
/// they arrived in. Large inputs are sorted across the rayon pool.
pub fn combine(mut values: Vec<String>, separator: &str) -> String {
    values.par_sort_unstable();
    values.join(separator)
}

/// Waits for the whole upstream to drain, then emits exactly one value.
pub struct CombineStage {
    separator: String,
}

impl CombineStage {
    pub fn new() -> Self {
        Self::with_separator(COMBINE_SEPARATOR)
    }

    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

impl Default for CombineStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for CombineStage {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "combine"
    }

    fn run(&self, input: &Receiver<String>, output: &Sender<String>, ctx: &StageContext) -> Result<()> {
        let values: Vec<String> = ctx.drain(input).collect();

        // A cancelled drain may have stopped early; never emit a partial result.
        if ctx.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        debug!(stage = ctx.stage(), values = values.len(), "combining");
        ctx.emit(output, combine(values, &self.separator))
    }
}
