//! # Digest Module
//!
//! The two hash primitives the pipeline is built around.
//!
//! ## Roles
//! - **Heavy** - must never run concurrently with itself; the expand stage
//!   calls it behind an exclusive [`crate::core::gate::ResourceGate`]
//! - **Light** - safe for unbounded concurrent calls
//!
//! Any [`Digest`] can fill either role. The bundled ones are MD5 (default
//! heavy), CRC-32C (default light) and xxh3.
//!
//! ## Example
//! ```rust,ignore
//! use signal_pipeline::core::digest::{DigestConfig, DigestKind};
//!
//! let (heavy, light) = DigestConfig::new()
//!     .light(DigestKind::Xxh3)
//!     .build();
//! let checksum = light.digest("0")?;
//! ```

mod algorithms;
mod instrumented;
mod traits;

pub use algorithms::{Crc32Digest, Md5Digest, Xxh3Digest};
pub use instrumented::InstrumentedDigest;
pub use traits::{Digest, DigestKind, SharedDigest};

use std::sync::Arc;
use std::time::Duration;

impl DigestKind {
    /// Build a shared instance of this primitive
    pub fn build(&self) -> SharedDigest {
        match self {
            DigestKind::Md5 => Arc::new(Md5Digest),
            DigestKind::Crc32 => Arc::new(Crc32Digest),
            DigestKind::Xxh3 => Arc::new(Xxh3Digest),
        }
    }

    /// Build this primitive with a fixed delay added to every call
    pub fn build_with_latency(&self, latency: Duration) -> SharedDigest {
        match self {
            DigestKind::Md5 => Arc::new(InstrumentedDigest::new(Md5Digest).with_latency(latency)),
            DigestKind::Crc32 => {
                Arc::new(InstrumentedDigest::new(Crc32Digest).with_latency(latency))
            }
            DigestKind::Xxh3 => Arc::new(InstrumentedDigest::new(Xxh3Digest).with_latency(latency)),
        }
    }
}

/// Selects the heavy and light primitives
#[derive(Debug, Clone)]
pub struct DigestConfig {
    heavy: DigestKind,
    light: DigestKind,
    heavy_latency: Option<Duration>,
    light_latency: Option<Duration>,
}

impl DigestConfig {
    /// MD5 heavy, CRC-32C light, no added latency
    pub fn new() -> Self {
        Self {
            heavy: DigestKind::Md5,
            light: DigestKind::Crc32,
            heavy_latency: None,
            light_latency: None,
        }
    }

    pub fn heavy(mut self, kind: DigestKind) -> Self {
        self.heavy = kind;
        self
    }

    pub fn light(mut self, kind: DigestKind) -> Self {
        self.light = kind;
        self
    }

    /// Add latency to every call, e.g. to watch the gate and fan-out at work.
    ///
    /// The classic figures are 10 ms per heavy call and 1 s per light call.
    pub fn simulate_latency(mut self, heavy: Duration, light: Duration) -> Self {
        self.heavy_latency = Some(heavy);
        self.light_latency = Some(light);
        self
    }

    /// Build `(heavy, light)`
    pub fn build(&self) -> (SharedDigest, SharedDigest) {
        let make = |kind: DigestKind, latency: Option<Duration>| match latency {
            Some(latency) => kind.build_with_latency(latency),
            None => kind.build(),
        };
        (
            make(self.heavy, self.heavy_latency),
            make(self.light, self.light_latency),
        )
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self::new()
    }
}
