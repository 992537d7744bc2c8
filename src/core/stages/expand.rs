//! Per-item expansion: one heavy digest, two light digests.

use crate::core::digest::{Digest, SharedDigest};
use crate::core::gate::ResourceGate;
use crate::core::stage::{process_concurrently, run_indexed, Stage, StageContext};
use crate::error::{DigestError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Joins the two light digests of one item
pub const EXPAND_SEPARATOR: &str = "~";

/// Turns each item into `light(item) ~ light(heavy(item))`.
///
/// Every item runs on its own thread. The heavy digest is only called while
/// holding `heavy_gate`, so with the default exclusive gate it never runs
/// twice at the same time anywhere in the process, no matter how many items
/// are in flight. The two light digests of an item run in parallel on their
/// own threads.
pub struct ExpandStage<T> {
    heavy: SharedDigest,
    light: SharedDigest,
    heavy_gate: Arc<ResourceGate>,
    _item: PhantomData<fn(T)>,
}

impl<T> ExpandStage<T> {
    /// Create the stage with its own exclusive heavy gate
    pub fn new(heavy: SharedDigest, light: SharedDigest) -> Self {
        Self::with_gate(heavy, light, Arc::new(ResourceGate::exclusive()))
    }

    /// Create the stage around an existing gate, e.g. one shared with other
    /// users of the same heavy primitive
    pub fn with_gate(heavy: SharedDigest, light: SharedDigest, heavy_gate: Arc<ResourceGate>) -> Self {
        Self {
            heavy,
            light,
            heavy_gate,
            _item: PhantomData,
        }
    }

    pub fn heavy_gate(&self) -> &Arc<ResourceGate> {
        &self.heavy_gate
    }

    /// Expand one rendered item
    pub fn expand(&self, data: &str) -> Result<String> {
        let heavy = {
            let _permit = self.heavy_gate.acquire();
            self.heavy.digest(data)?
        };

        // [light(data), light(heavy)]
        let digests = run_indexed([data, heavy.as_str()].map(|input| move || self.light.digest(input)))
            .into_iter()
            .collect::<std::result::Result<Vec<String>, DigestError>>()?;

        Ok(digests.join(EXPAND_SEPARATOR))
    }
}

impl<T> Stage for ExpandStage<T>
where
    T: Display + Send + 'static,
{
    type Input = T;
    type Output = String;

    fn name(&self) -> &str {
        "expand"
    }

    fn run(&self, input: &Receiver<T>, output: &Sender<String>, ctx: &StageContext) -> Result<()> {
        process_concurrently(input, output, ctx, |item| {
            let data = item.to_string();
            let expanded = self.expand(&data)?;
            debug!(stage = ctx.stage(), %data, %expanded, "item expanded");
            Ok(expanded)
        })
    }
}
