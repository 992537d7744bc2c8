//! Per-item fan-out over six prefixed light digests.

use crate::core::digest::{Digest, SharedDigest};
use crate::core::stage::{process_concurrently, run_indexed, Stage, StageContext};
use crate::error::{DigestError, Result};
use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

/// Number of prefixed variants per item (prefixes `0` through `5`)
pub const FANOUT_WIDTH: usize = 6;

/// Turns each value into `light("0" + v) ++ light("1" + v) ++ ... ++ light("5" + v)`.
pub struct FanoutStage {
    light: SharedDigest,
}

impl FanoutStage {
    pub fn new(light: SharedDigest) -> Self {
        Self { light }
    }

    /// Fan out one value.
    ///
    /// Every variant runs on its own thread and lands in its index slot, so
    /// the concatenation order never depends on which digest finished first.
    pub fn fan_out(&self, data: &str) -> Result<String> {
        let parts = run_indexed((0..FANOUT_WIDTH).map(|i| move || self.light.digest(&format!("{i}{data}"))))
            .into_iter()
            .collect::<std::result::Result<Vec<String>, DigestError>>()?;

        Ok(parts.concat())
    }
}

impl Stage for FanoutStage {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "fanout"
    }

    fn run(&self, input: &Receiver<String>, output: &Sender<String>, ctx: &StageContext) -> Result<()> {
        process_concurrently(input, output, ctx, |data| {
            let combined = self.fan_out(&data)?;
            debug!(stage = ctx.stage(), %data, "item fanned out");
            Ok(combined)
        })
    }
}
