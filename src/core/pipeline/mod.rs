//! # Pipeline Module
//!
//! Wires stages into a chain of hand-off channels and runs them.
//!
//! ## Execution Model
//! - Every stage runs on its own named thread
//! - Each adjacent pair of stages shares one channel
//! - A stage's outbound channel is closed as soon as the stage returns,
//!   which is how the next stage learns its input is complete
//! - `run` returns only after every stage thread has been joined
//!
//! ## Failure Model
//! All or nothing: the first failing stage cancels the run, every other
//! stage stops cooperatively, and the caller gets the error with no output.

mod config;
mod executor;
mod signer;

pub use config::PipelineConfig;
pub use executor::{execute_stages, Pipeline, PipelineBuilder, PipelineResult};
pub use signer::{SignerPipeline, SignerPipelineBuilder};

pub use crate::core::stage::CancellationToken;
