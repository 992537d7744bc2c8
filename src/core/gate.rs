//! Counting gate for shared resources.
//!
//! A [`ResourceGate`] hands out at most `capacity` permits at a time. With
//! capacity 1 it is a mutual-exclusion lock around an external primitive;
//! with a larger capacity it bounds how many items a stage keeps in flight.
//! Permits are released when the [`GatePermit`] is dropped.

use crate::error::PipelineError;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A counting semaphore with RAII permits
#[derive(Debug)]
pub struct ResourceGate {
    capacity: usize,
    in_use: Mutex<usize>,
    released: Condvar,
}

impl ResourceGate {
    /// Create a gate admitting `capacity` holders at once
    pub fn new(capacity: usize) -> Result<Self, PipelineError> {
        if capacity == 0 {
            return Err(PipelineError::Config(
                "gate capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            in_use: Mutex::new(0),
            released: Condvar::new(),
        })
    }

    /// A gate that admits one holder at a time
    pub fn exclusive() -> Self {
        Self {
            capacity: 1,
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Block until a permit is free
    pub fn acquire(&self) -> GatePermit<'_> {
        let mut in_use = self.lock();
        while *in_use >= self.capacity {
            in_use = self
                .released
                .wait(in_use)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_use += 1;
        GatePermit { gate: self }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held
    pub fn in_use(&self) -> usize {
        *self.lock()
    }

    // The counter stays consistent even if a holder panicked, so a
    // poisoned lock is safe to keep using.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut in_use = self.lock();
        *in_use -= 1;
        drop(in_use);
        self.released.notify_one();
    }
}

impl Default for ResourceGate {
    fn default() -> Self {
        Self::exclusive()
    }
}

/// Proof of holding one gate permit
#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a ResourceGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
