//! # signal-pipeline CLI
//!
//! Command-line interface for the signing pipeline.
//!
//! ## Usage
//! ```bash
//! signal-pipeline run 0 1 1 2 3 5 8
//! signal-pipeline run --count 100 --light xxh3 --output json
//! ```

mod cli;

use signal_pipeline::Result;

fn main() -> Result<()> {
    signal_pipeline::init_tracing();
    cli::run()
}
