//! # Signal Pipeline
//!
//! A concurrent staged hashing pipeline.
//!
//! ## How It Works
//! Items flow through a chain of stages connected by channels. Each stage
//! handles every item on its own thread and fans out further inside an
//! item. One primitive must never run concurrently with itself, so it sits
//! behind an explicit gate. The final stage sorts everything it received,
//! which makes the combined output independent of scheduling.
//!
//! ## Architecture
//! - `core` - The pipeline engine
//! - `events` - Progress reporting over channels
//! - `error` - Error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{PipelineError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
