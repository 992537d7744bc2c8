//! The expand -> fanout -> combine signing chain.

use super::{Pipeline, PipelineBuilder, PipelineConfig, PipelineResult};
use crate::core::digest::{Digest, DigestConfig, SharedDigest};
use crate::core::gate::ResourceGate;
use crate::core::stages::{CombineStage, ExpandStage, FanoutStage};
use crate::error::Result;
use crate::events::{null_sender, EventSender};
use std::fmt::Display;
use std::sync::Arc;

/// Builder for [`SignerPipeline`]
pub struct SignerPipelineBuilder {
    digests: DigestConfig,
    heavy: Option<SharedDigest>,
    light: Option<SharedDigest>,
    heavy_capacity: usize,
    heavy_gate: Option<Arc<ResourceGate>>,
    config: PipelineConfig,
}

impl SignerPipelineBuilder {
    pub fn new() -> Self {
        Self {
            digests: DigestConfig::default(),
            heavy: None,
            light: None,
            heavy_capacity: 1,
            heavy_gate: None,
            config: PipelineConfig::default(),
        }
    }

    /// Pick bundled primitives for whichever of heavy/light is not set explicitly
    pub fn digests(mut self, digests: DigestConfig) -> Self {
        self.digests = digests;
        self
    }

    /// Use a custom heavy primitive
    pub fn heavy(mut self, digest: SharedDigest) -> Self {
        self.heavy = Some(digest);
        self
    }

    /// Use a custom light primitive
    pub fn light(mut self, digest: SharedDigest) -> Self {
        self.light = Some(digest);
        self
    }

    /// How many heavy calls may run at once (default 1)
    pub fn heavy_capacity(mut self, capacity: usize) -> Self {
        self.heavy_capacity = capacity;
        self
    }

    /// Share an existing heavy gate; overrides `heavy_capacity`
    pub fn heavy_gate(mut self, gate: Arc<ResourceGate>) -> Self {
        self.heavy_gate = Some(gate);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = Some(capacity);
        self
    }

    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.config.max_in_flight = Some(limit);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<SignerPipeline> {
        self.config.validate()?;

        let heavy_gate = match self.heavy_gate {
            Some(gate) => gate,
            None => Arc::new(ResourceGate::new(self.heavy_capacity)?),
        };
        let (default_heavy, default_light) = self.digests.build();

        Ok(SignerPipeline {
            heavy: self.heavy.unwrap_or(default_heavy),
            light: self.light.unwrap_or(default_light),
            heavy_gate,
            config: self.config,
        })
    }
}

impl Default for SignerPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes one combined signature for a set of items.
///
/// Every item becomes `light(item) ~ light(heavy(item))`, is fanned out into
/// six prefixed light digests, and all results are sorted and joined with
/// `_`. The heavy gate lives as long as this value, so runs that reuse one
/// `SignerPipeline` never overlap heavy calls either.
pub struct SignerPipeline {
    heavy: SharedDigest,
    light: SharedDigest,
    heavy_gate: Arc<ResourceGate>,
    config: PipelineConfig,
}

impl SignerPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> SignerPipelineBuilder {
        SignerPipelineBuilder::new()
    }

    pub fn heavy_gate(&self) -> &Arc<ResourceGate> {
        &self.heavy_gate
    }

    pub fn heavy_name(&self) -> &str {
        self.heavy.name()
    }

    pub fn light_name(&self) -> &str {
        self.light.name()
    }

    /// Assemble the three stages over `items` without running them
    pub fn pipeline<T, I>(&self, items: I) -> PipelineBuilder<String>
    where
        T: Display + Send + 'static,
        I: IntoIterator<Item = T>,
    {
        Pipeline::source(items)
            .config(self.config.clone())
            .stage(ExpandStage::with_gate(
                Arc::clone(&self.heavy),
                Arc::clone(&self.light),
                Arc::clone(&self.heavy_gate),
            ))
            .stage(FanoutStage::new(Arc::clone(&self.light)))
            .stage(CombineStage::new())
    }

    /// Run the chain with event reporting
    pub fn run_with_events<T, I>(&self, items: I, events: &EventSender) -> Result<PipelineResult<String>>
    where
        T: Display + Send + 'static,
        I: IntoIterator<Item = T>,
    {
        self.pipeline(items).run_with_events(events)
    }

    /// Run the chain and return the combined signature
    pub fn combine<T, I>(&self, items: I) -> Result<String>
    where
        T: Display + Send + 'static,
        I: IntoIterator<Item = T>,
    {
        self.run_with_events(items, &null_sender())?.into_single()
    }
}
