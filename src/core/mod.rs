//! # Core Module
//!
//! The UI-agnostic pipeline engine.
//!
//! ## Modules
//! - `digest` - The heavy and light hash primitives
//! - `gate` - Counting gate guarding shared resources
//! - `stage` - Stage trait, per-stage context and cancellation
//! - `stages` - Expand, fanout and combine
//! - `pipeline` - Executor, builder and the signing chain

pub mod digest;
pub mod gate;
pub mod pipeline;
pub mod stage;
pub mod stages;

// Re-export commonly used types
pub use digest::{Digest, DigestKind, SharedDigest};
pub use gate::ResourceGate;
pub use pipeline::{Pipeline, PipelineConfig, PipelineResult, SignerPipeline};
pub use stage::{CancellationToken, Stage, StageContext};
