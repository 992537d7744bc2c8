//! Pipeline execution implementation.

use super::PipelineConfig;
use crate::core::gate::ResourceGate;
use crate::core::stage::{CancellationToken, Stage, StageContext};
use crate::error::{PipelineError, Result};
use crate::events::{
    null_sender, Event, EventSender, PipelineEvent, PipelineSummary, StageEvent, StageReport,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of a completed run
#[derive(Debug)]
pub struct PipelineResult<T> {
    /// Identifier shared with the run's events
    pub run_id: Uuid,
    /// Everything the last stage emitted
    pub outputs: Vec<T>,
    /// One report per stage, in pipeline order
    pub stages: Vec<StageReport>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl<T> PipelineResult<T> {
    /// The single value of a pipeline whose last stage reduces everything
    pub fn into_single(self) -> Result<T> {
        let count = self.outputs.len();
        let mut outputs = self.outputs.into_iter();
        match (outputs.next(), count) {
            (Some(value), 1) => Ok(value),
            _ => Err(PipelineError::stage(
                self.stages
                    .last()
                    .map(|report| report.stage.as_str())
                    .unwrap_or("pipeline"),
                format!("expected exactly one output, got {count}"),
            )),
        }
    }
}

/// Entry points for building a pipeline
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline fed from a fixed set of items.
    ///
    /// The input channel is closed once every item is queued, so the first
    /// stage drains naturally.
    pub fn source<T, I>(items: I) -> PipelineBuilder<T>
    where
        T: Send + 'static,
        I: IntoIterator<Item = T>,
    {
        let (sender, receiver) = unbounded();
        for item in items {
            if sender.send(item).is_err() {
                break;
            }
        }
        Self::from_receiver(receiver)
    }

    /// Start a pipeline fed from an external channel.
    ///
    /// The first stage drains until every sender of `input` is dropped.
    pub fn from_receiver<T: Send + 'static>(input: Receiver<T>) -> PipelineBuilder<T> {
        PipelineBuilder {
            config: PipelineConfig::default(),
            cancel: CancellationToken::new(),
            stages: Vec::new(),
            launch: Box::new(move |_run: &mut RunContext| Ok(input)),
        }
    }
}

/// Launches every stage of the chain and yields the final channel.
type Launch<T> = Box<dyn FnOnce(&mut RunContext) -> Result<Receiver<T>> + Send>;

/// Builder for a chain of stages whose last output type is `T`
pub struct PipelineBuilder<T> {
    config: PipelineConfig,
    cancel: CancellationToken,
    stages: Vec<String>,
    launch: Launch<T>,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// Set channel capacity and in-flight limits
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an external token so the caller can cancel the run
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Append a stage reading this pipeline's current output
    pub fn stage<S>(self, stage: S) -> PipelineBuilder<S::Output>
    where
        S: Stage<Input = T>,
    {
        let Self {
            config,
            cancel,
            mut stages,
            launch,
        } = self;
        stages.push(stage.name().to_string());

        PipelineBuilder {
            config,
            cancel,
            stages,
            launch: Box::new(move |run: &mut RunContext| {
                let input = launch(run)?;
                run.spawn(stage, input)
            }),
        }
    }

    /// Stage names in pipeline order
    pub fn stage_names(&self) -> &[String] {
        &self.stages
    }

    /// Run the pipeline without events
    pub fn run(self) -> Result<PipelineResult<T>> {
        self.run_with_events(&null_sender())
    }

    /// Run every stage to completion.
    ///
    /// Returns only after every stage worker has terminated. Any stage
    /// failure cancels the run and no output is returned.
    pub fn run_with_events(self, events: &EventSender) -> Result<PipelineResult<T>> {
        self.config.validate()?;

        let start_time = Instant::now();
        let run_id = Uuid::new_v4();
        info!(%run_id, stages = ?self.stages, "pipeline started");
        events.send(Event::Pipeline(PipelineEvent::Started {
            run_id,
            stages: self.stages.clone(),
        }));

        let mut run = RunContext {
            config: self.config,
            cancel: self.cancel,
            events: events.clone(),
            workers: Vec::new(),
        };

        let (outputs, launch_error) = match (self.launch)(&mut run) {
            Ok(output) => (output.iter().collect::<Vec<T>>(), None),
            Err(err) => {
                run.cancel.cancel();
                (Vec::new(), Some(err))
            }
        };

        let cancel = run.cancel.clone();
        let (reports, stage_error) = run.join();

        // A stage that stopped early on cancellation may still have returned
        // Ok, so the token decides whether the output is complete.
        let failure = launch_error
            .or(stage_error)
            .or_else(|| cancel.is_cancelled().then_some(PipelineError::Cancelled));

        if let Some(err) = failure {
            warn!(%run_id, error = %err, "pipeline aborted");
            events.send(Event::Pipeline(PipelineEvent::Cancelled {
                run_id,
                reason: err.to_string(),
            }));
            return Err(err);
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!(%run_id, outputs = outputs.len(), duration_ms, "pipeline completed");
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: PipelineSummary {
                run_id,
                outputs: outputs.len(),
                stages: reports.clone(),
                duration_ms,
            },
        }));

        Ok(PipelineResult {
            run_id,
            outputs,
            stages: reports,
            duration_ms,
        })
    }
}

/// Run an ordered list of stages that all share one value type
pub fn execute_stages<T: Send + 'static>(
    input: Receiver<T>,
    stages: Vec<Box<dyn Stage<Input = T, Output = T>>>,
    config: PipelineConfig,
) -> Result<PipelineResult<T>> {
    stages
        .into_iter()
        .fold(Pipeline::from_receiver(input).config(config), |pipeline, stage| {
            pipeline.stage(stage)
        })
        .run()
}

/// State of one run while its workers are alive
struct RunContext {
    config: PipelineConfig,
    cancel: CancellationToken,
    events: EventSender,
    workers: Vec<Worker>,
}

struct Worker {
    stage: String,
    handle: JoinHandle<StageOutcome>,
}

struct StageOutcome {
    result: Result<()>,
    report: StageReport,
}

impl RunContext {
    /// Start one stage on its own thread and return its outbound channel
    fn spawn<S: Stage>(&mut self, stage: S, input: Receiver<S::Input>) -> Result<Receiver<S::Output>> {
        let (output, downstream) = self.config.channel();
        let name = stage.name().to_string();

        let mut ctx = StageContext::new(name.clone(), self.cancel.clone(), self.events.clone());
        if let Some(limit) = self.config.max_in_flight {
            ctx = ctx.with_in_flight_limit(Arc::new(ResourceGate::new(limit)?));
        }

        let handle = thread::Builder::new()
            .name(format!("stage-{name}"))
            .spawn(move || run_stage(stage, input, output, ctx))
            .map_err(|source| PipelineError::Spawn {
                stage: name.clone(),
                source,
            })?;

        self.workers.push(Worker {
            stage: name,
            handle,
        });
        Ok(downstream)
    }

    /// Wait for every worker; keep the first real failure in pipeline order.
    /// Cancellation errors are echoes of that failure and are dropped.
    fn join(self) -> (Vec<StageReport>, Option<PipelineError>) {
        let mut reports = Vec::with_capacity(self.workers.len());
        let mut failure = None;

        for worker in self.workers {
            match worker.handle.join() {
                Ok(outcome) => {
                    reports.push(outcome.report);
                    match outcome.result {
                        Ok(()) => {}
                        Err(err) if err.is_cancellation() => {}
                        Err(err) => {
                            failure.get_or_insert(err);
                        }
                    }
                }
                Err(payload) => {
                    failure.get_or_insert(PipelineError::StagePanicked {
                        stage: worker.stage,
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
        }

        (reports, failure)
    }
}

/// Cancels the run if the stage worker unwinds.
struct CancelOnPanic<'a>(&'a StageContext);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.cancel();
        }
    }
}

fn run_stage<S: Stage>(
    stage: S,
    input: Receiver<S::Input>,
    output: Sender<S::Output>,
    ctx: StageContext,
) -> StageOutcome {
    let _guard = CancelOnPanic(&ctx);
    let started = Instant::now();

    debug!(stage = ctx.stage(), "stage started");
    ctx.events().send(Event::Stage(StageEvent::Started {
        stage: ctx.stage().to_string(),
    }));

    let result = stage.run(&input, &output, &ctx);

    // Cancel before our channels close so neighbours see a cancelled run,
    // not a vanished peer.
    if let Err(err) = &result {
        ctx.cancel();
        if !err.is_cancellation() {
            warn!(stage = ctx.stage(), error = %err, "stage failed");
            ctx.events().send(Event::Stage(StageEvent::Failed {
                stage: ctx.stage().to_string(),
                message: err.to_string(),
            }));
        }
    }

    // Closing the outbound channel is the end-of-stream signal downstream.
    drop(output);
    drop(input);

    let report = StageReport {
        stage: ctx.stage().to_string(),
        items_in: ctx.received(),
        items_out: ctx.emitted(),
        duration_ms: started.elapsed().as_millis() as u64,
    };
    debug!(stage = ctx.stage(), items_in = report.items_in, items_out = report.items_out, "stage drained");
    ctx.events().send(Event::Stage(StageEvent::Drained {
        report: report.clone(),
    }));

    StageOutcome { result, report }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stage::FnStage;
    use crate::events::EventChannel;

    fn doubler() -> FnStage<
        u64,
        u64,
        impl Fn(&Receiver<u64>, &Sender<u64>, &StageContext) -> Result<()> + Send + Sync + 'static,
    > {
        FnStage::new("double", |input: &Receiver<u64>, output: &Sender<u64>, ctx: &StageContext| {
            for n in ctx.drain(input) {
                ctx.emit(output, n * 2)?;
            }
            Ok(())
        })
    }

    #[test]
    fn empty_pipeline_passes_items_through() {
        let result = Pipeline::source(vec![1, 2, 3]).run().unwrap();
        assert_eq!(result.outputs, vec![1, 2, 3]);
        assert!(result.stages.is_empty());
    }

    #[test]
    fn stages_are_chained_in_order() {
        let result = Pipeline::source(vec![1u64, 2, 3])
            .stage(doubler())
            .stage(doubler())
            .run()
            .unwrap();

        let mut outputs = result.outputs;
        outputs.sort_unstable();
        assert_eq!(outputs, vec![4, 8, 12]);
        assert_eq!(result.stages.len(), 2);
        assert_eq!(result.stages[0].items_in, 3);
        assert_eq!(result.stages[1].items_out, 3);
    }

    #[test]
    fn builder_records_stage_names() {
        let builder = Pipeline::source(Vec::<u64>::new()).stage(doubler());
        assert_eq!(builder.stage_names(), ["double".to_string()]);
    }

    #[test]
    fn stage_failure_aborts_without_output() {
        let failing = FnStage::new("fail", |input: &Receiver<u64>, _: &Sender<u64>, ctx: &StageContext| {
            for n in ctx.drain(input) {
                if n == 2 {
                    return Err(PipelineError::stage(ctx.stage(), "item 2 rejected"));
                }
            }
            Ok(())
        });

        let err = Pipeline::source(vec![1u64, 2, 3])
            .stage(doubler())
            .stage(failing)
            .run()
            .unwrap_err();

        match err {
            PipelineError::Stage { stage, .. } => assert_eq!(stage, "fail"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stage_panic_is_reported() {
        let panicking = FnStage::new("boom", |_: &Receiver<u64>, _: &Sender<u64>, _: &StageContext| {
            panic!("stage exploded")
        });

        let err = Pipeline::source(vec![1u64]).stage(panicking).run().unwrap_err();

        match err {
            PipelineError::StagePanicked { stage, message } => {
                assert_eq!(stage, "boom");
                assert!(message.contains("exploded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn external_cancellation_stops_the_run() {
        let token = CancellationToken::new();
        token.cancel();

        let (_keep_open, input) = unbounded::<u64>();
        let err = Pipeline::from_receiver(input)
            .cancellation(token)
            .stage(doubler())
            .run()
            .unwrap_err();

        assert!(err.is_cancellation());
    }

    #[test]
    fn invalid_config_is_rejected_before_launch() {
        let err = Pipeline::source(vec![1u64])
            .config(PipelineConfig::new().max_in_flight(0))
            .stage(doubler())
            .run()
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn events_bracket_the_run() {
        let (sender, receiver) = EventChannel::new();

        Pipeline::source(vec![5u64])
            .stage(doubler())
            .run_with_events(&sender)
            .unwrap();
        drop(sender);

        let events: Vec<Event> = receiver.iter().collect();
        assert!(matches!(
            events.first(),
            Some(Event::Pipeline(PipelineEvent::Started { .. }))
        ));
        assert!(matches!(
            events.last(),
            Some(Event::Pipeline(PipelineEvent::Completed { .. }))
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Stage(StageEvent::Drained { .. }))));
    }

    #[test]
    fn execute_stages_runs_a_uniform_list() {
        let (tx, rx) = unbounded();
        tx.send(1u64).unwrap();
        tx.send(10).unwrap();
        drop(tx);

        let stages: Vec<Box<dyn Stage<Input = u64, Output = u64>>> =
            vec![Box::new(doubler()), Box::new(doubler()), Box::new(doubler())];
        let result = execute_stages(rx, stages, PipelineConfig::new().channel_capacity(0)).unwrap();

        let mut outputs = result.outputs;
        outputs.sort_unstable();
        assert_eq!(outputs, vec![8, 80]);
    }

    #[test]
    fn single_output_is_extracted() {
        let result = PipelineResult {
            run_id: Uuid::nil(),
            outputs: vec!["only".to_string()],
            stages: Vec::new(),
            duration_ms: 0,
        };
        assert_eq!(result.into_single().unwrap(), "only");
    }

    #[test]
    fn multiple_outputs_are_not_single() {
        let result = PipelineResult {
            run_id: Uuid::nil(),
            outputs: vec![1, 2],
            stages: Vec::new(),
            duration_ms: 0,
        };
        assert!(result.into_single().is_err());
    }
}
