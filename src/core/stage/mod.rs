//! # Stage Module
//!
//! The unit of work the executor chains together.
//!
//! A stage reads its inbound channel until it is closed, writes zero or more
//! values to its outbound channel, and returns. The executor drops the
//! outbound sender as soon as `run` returns; that is the only end-of-stream
//! signal the next stage ever sees.
//!
//! Each boundary carries one concrete type: a stage's `Output` must be the
//! next stage's `Input`, so mismatched stages fail to compile.

mod cancel;
mod context;

pub use cancel::CancellationToken;
pub use context::{Drain, StageContext};

use crate::error::{PipelineError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::marker::PhantomData;
use std::panic;
use std::sync::{Mutex, PoisonError};
use std::thread;

/// One concurrent processing step
pub trait Stage: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Name used for the worker thread, logs, events and errors
    fn name(&self) -> &str;

    /// Drain `input`, writing results to `output`.
    ///
    /// Returning an error cancels the whole run.
    fn run(
        &self,
        input: &Receiver<Self::Input>,
        output: &Sender<Self::Output>,
        ctx: &StageContext,
    ) -> Result<()>;
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    type Input = S::Input;
    type Output = S::Output;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(
        &self,
        input: &Receiver<Self::Input>,
        output: &Sender<Self::Output>,
        ctx: &StageContext,
    ) -> Result<()> {
        (**self).run(input, output, ctx)
    }
}

/// A stage built from a plain function.
///
/// Useful for sources and sinks that do not need their own type:
///
/// ```rust,ignore
/// let double = FnStage::new("double", |input: &Receiver<u64>, output: &Sender<u64>, ctx: &StageContext| {
///     for n in ctx.drain(input) {
///         ctx.emit(output, n * 2)?;
///     }
///     Ok(())
/// });
/// ```
pub struct FnStage<I, O, F> {
    name: String,
    body: F,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O, F> FnStage<I, O, F>
where
    F: Fn(&Receiver<I>, &Sender<O>, &StageContext) -> Result<()>,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
            _types: PhantomData,
        }
    }
}

impl<I, O, F> Stage for FnStage<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(&Receiver<I>, &Sender<O>, &StageContext) -> Result<()> + Send + Sync + 'static,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: &Receiver<I>, output: &Sender<O>, ctx: &StageContext) -> Result<()> {
        (self.body)(input, output, ctx)
    }
}

/// Process every inbound item on its own thread and emit each result as
/// soon as it is ready.
///
/// Items are not forwarded in arrival order. The call returns only after
/// every spawned item has finished. The first item error cancels the run
/// and is returned once all in-flight items are joined.
pub fn process_concurrently<I, O, F>(
    input: &Receiver<I>,
    output: &Sender<O>,
    ctx: &StageContext,
    process: F,
) -> Result<()>
where
    I: Send,
    O: Send,
    F: Fn(I) -> Result<O> + Sync,
{
    let first_error: Mutex<Option<PipelineError>> = Mutex::new(None);

    thread::scope(|scope| {
        for item in ctx.drain(input) {
            let permit = ctx.admit();
            let process = &process;
            let first_error = &first_error;

            scope.spawn(move || {
                let _permit = permit;
                if let Err(err) = process(item).and_then(|value| ctx.emit(output, value)) {
                    ctx.cancel();
                    if !err.is_cancellation() {
                        first_error
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .get_or_insert(err);
                    }
                }
            });
        }
    });

    match first_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
        Some(err) => Err(err),
        None if ctx.is_cancelled() => Err(PipelineError::Cancelled),
        None => Ok(()),
    }
}

/// Run every task on its own scoped thread and return the results in task
/// order.
///
/// Tasks are never queued behind a fixed-size pool, so blocking tasks all
/// make progress at once. A panicking task re-raises its panic here.
pub fn run_indexed<T, F, I>(tasks: I) -> Vec<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
    I: IntoIterator<Item = F>,
{
    thread::scope(|scope| {
        let handles: Vec<_> = tasks.into_iter().map(|task| scope.spawn(task)).collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
            .collect()
    })
}
