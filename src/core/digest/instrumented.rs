//! Call accounting around a digest.
//!
//! Wraps any [`Digest`] and records how many calls were made and how many
//! ever overlapped. Optionally adds a fixed latency to each call so slow
//! primitives can be simulated, and can refuse overlapping calls outright
//! the way a primitive that must never run concurrently would.

use super::Digest;
use crate::error::DigestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// A digest that counts its own calls.
pub struct InstrumentedDigest<D> {
    inner: D,
    latency: Option<Duration>,
    reject_overlap: bool,
    calls: AtomicUsize,
    in_progress: AtomicUsize,
    peak: AtomicUsize,
}

impl<D: Digest> InstrumentedDigest<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            latency: None,
            reject_overlap: false,
            calls: AtomicUsize::new(0),
            in_progress: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Sleep for `latency` inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail with [`DigestError::Overheated`] when a call starts while
    /// another one is still running
    pub fn reject_overlap(mut self, reject: bool) -> Self {
        self.reject_overlap = reject;
        self
    }

    /// Total calls started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls ever running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Calls running right now
    pub fn in_progress(&self) -> usize {
        self.in_progress.load(Ordering::SeqCst)
    }
}

/// Decrements the in-progress counter even if the inner digest panics.
struct CallGuard<'a>(&'a AtomicUsize);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<D: Digest> Digest for InstrumentedDigest<D> {
    fn digest(&self, data: &str) -> Result<String, DigestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_progress.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = CallGuard(&self.in_progress);
        self.peak.fetch_max(running, Ordering::SeqCst);

        if self.reject_overlap && running > 1 {
            return Err(DigestError::Overheated {
                primitive: self.inner.name().to_string(),
            });
        }

        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }

        self.inner.digest(data)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
