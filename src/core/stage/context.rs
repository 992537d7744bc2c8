//! Per-stage runtime context.

use super::CancellationToken;
use crate::core::gate::{GatePermit, ResourceGate};
use crate::error::{PipelineError, Result};
use crate::events::{Event, EventSender, StageEvent, StageProgress};
use crossbeam_channel::{select, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Everything a stage worker needs besides its channels.
///
/// Shared by reference with the per-item threads a stage spawns, so all
/// bookkeeping is atomic.
#[derive(Debug)]
pub struct StageContext {
    stage: String,
    cancel: CancellationToken,
    events: EventSender,
    in_flight: Option<Arc<ResourceGate>>,
    received: AtomicUsize,
    emitted: AtomicUsize,
}

impl StageContext {
    pub fn new(stage: impl Into<String>, cancel: CancellationToken, events: EventSender) -> Self {
        Self {
            stage: stage.into(),
            cancel,
            events,
            in_flight: None,
            received: AtomicUsize::new(0),
            emitted: AtomicUsize::new(0),
        }
    }

    /// Bound the number of items this stage processes at once
    pub fn with_in_flight_limit(mut self, gate: Arc<ResourceGate>) -> Self {
        self.in_flight = Some(gate);
        self
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the whole run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Iterate the inbound channel until it is closed or the run is cancelled
    pub fn drain<'a, T>(&'a self, input: &'a Receiver<T>) -> Drain<'a, T> {
        Drain { input, ctx: self }
    }

    /// Wait for an in-flight slot, if this stage is bounded
    pub fn admit(&self) -> Option<GatePermit<'_>> {
        self.in_flight.as_deref().map(ResourceGate::acquire)
    }

    /// Send one value downstream and record it
    pub fn emit<T>(&self, output: &Sender<T>, value: T) -> Result<()> {
        if output.send(value).is_err() {
            if self.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            return Err(PipelineError::stage(
                &self.stage,
                "downstream stage stopped reading",
            ));
        }

        let completed = self.emitted.fetch_add(1, Ordering::SeqCst) + 1;
        if self.events.is_attached() {
            self.events.send(Event::Stage(StageEvent::ItemCompleted(StageProgress {
                stage: self.stage.clone(),
                completed,
            })));
        }
        Ok(())
    }

    /// Values read from the inbound channel so far
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    /// Values sent downstream so far
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }
}

/// Blocking iterator over a stage's inbound channel.
///
/// Ends when the upstream closes the channel or when the run is cancelled,
/// whichever comes first.
pub struct Drain<'a, T> {
    input: &'a Receiver<T>,
    ctx: &'a StageContext,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.ctx.is_cancelled() {
            return None;
        }

        select! {
            recv(self.input) -> msg => match msg {
                Ok(value) => {
                    self.ctx.received.fetch_add(1, Ordering::SeqCst);
                    Some(value)
                }
                Err(_) => None,
            },
            recv(self.ctx.cancel.signal()) -> _ => None,
        }
    }
}
