//! # Events Module
//!
//! Progress reporting for pipeline runs.
//!
//! Stage workers emit events through a crossbeam channel so a CLI (or any
//! other front end) can follow a run without touching the pipeline itself.
//!
//! ## Example
//! ```no_run
//! use signal_pipeline::core::pipeline::SignerPipeline;
//! use signal_pipeline::events::{Event, EventChannel, StageEvent};
//!
//! # fn main() -> signal_pipeline::Result<()> {
//! let pipeline = SignerPipeline::builder().build()?;
//! let (sender, receiver) = EventChannel::new();
//!
//! let printer = std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Stage(StageEvent::Drained { report }) = event {
//!             println!("{report}");
//!         }
//!     }
//! });
//!
//! let result = pipeline.run_with_events(0..7u64, &sender)?;
//! drop(sender);
//! printer.join().ok();
//! println!("{}", result.into_single()?);
//! # Ok(())
//! # }
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
