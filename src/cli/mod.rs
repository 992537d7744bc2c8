//! # CLI Module
//!
//! Command-line interface for the signing pipeline.
//!
//! ## Usage
//! ```bash
//! # Sign the default items 0..7
//! signal-pipeline run
//!
//! # Sign explicit items
//! signal-pipeline run 0 1 1 2 3 5 8
//!
//! # Use xxh3 as the light primitive and emit JSON
//! signal-pipeline run --count 50 --light xxh3 --output json
//!
//! # Watch the gate at work with realistic primitive latency
//! signal-pipeline run --simulate-latency --verbose
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use signal_pipeline::core::digest::{DigestConfig, DigestKind};
use signal_pipeline::core::pipeline::SignerPipeline;
use signal_pipeline::core::stages::FANOUT_WIDTH;
use signal_pipeline::error::Result;
use signal_pipeline::events::{Event, EventChannel, PipelineEvent, StageEvent, StageReport};
use std::thread;
use std::time::Duration;

/// Latency added to each heavy call by `--simulate-latency`
const SIMULATED_HEAVY_LATENCY: Duration = Duration::from_millis(10);
/// Latency added to each light call by `--simulate-latency`
const SIMULATED_LIGHT_LATENCY: Duration = Duration::from_secs(1);

/// Signal Pipeline - concurrent staged hashing with a deterministic result
#[derive(Parser, Debug)]
#[command(name = "signal-pipeline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run items through expand -> fanout -> combine
    Run {
        /// Items to sign (defaults to 0..COUNT)
        items: Vec<String>,

        /// Number of sequential items to generate when none are given
        #[arg(short, long, default_value = "7")]
        count: u64,

        /// Heavy primitive (called one at a time)
        #[arg(long, default_value = "md5")]
        heavy: Primitive,

        /// Light primitive (called freely in parallel)
        #[arg(long, default_value = "crc32")]
        light: Primitive,

        /// Heavy calls allowed at once
        #[arg(long, default_value = "1")]
        heavy_capacity: usize,

        /// Maximum items each stage processes at once
        #[arg(long)]
        max_in_flight: Option<usize>,

        /// Capacity of the channels between stages (0 = hand-off)
        #[arg(long)]
        channel_capacity: Option<usize>,

        /// Add 10 ms to every heavy call and 1 s to every light call
        #[arg(long)]
        simulate_latency: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the bundled primitives
    Primitives,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Primitive {
    /// MD5, hex
    Md5,
    /// CRC-32C, decimal
    Crc32,
    /// xxh3-64, decimal
    Xxh3,
}

impl From<Primitive> for DigestKind {
    fn from(primitive: Primitive) -> Self {
        match primitive {
            Primitive::Md5 => DigestKind::Md5,
            Primitive::Crc32 => DigestKind::Crc32,
            Primitive::Xxh3 => DigestKind::Xxh3,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// The combined value only
    Minimal,
}

/// Options for one `run` invocation
struct RunOptions {
    items: Vec<String>,
    digests: DigestConfig,
    heavy_capacity: usize,
    max_in_flight: Option<usize>,
    channel_capacity: Option<usize>,
    output: OutputFormat,
    verbose: bool,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            items,
            count,
            heavy,
            light,
            heavy_capacity,
            max_in_flight,
            channel_capacity,
            simulate_latency,
            output,
            verbose,
        } => {
            let items = if items.is_empty() {
                (0..count).map(|i| i.to_string()).collect()
            } else {
                items
            };

            let mut digests = DigestConfig::new().heavy(heavy.into()).light(light.into());
            if simulate_latency {
                digests = digests.simulate_latency(SIMULATED_HEAVY_LATENCY, SIMULATED_LIGHT_LATENCY);
            }

            run_pipeline(RunOptions {
                items,
                digests,
                heavy_capacity,
                max_in_flight,
                channel_capacity,
                output,
                verbose,
            })
        }
        Commands::Primitives => {
            list_primitives();
            Ok(())
        }
    }
}

fn run_pipeline(options: RunOptions) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(options.output, OutputFormat::Pretty);

    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Signal Pipeline").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let mut builder = SignerPipeline::builder()
        .digests(options.digests)
        .heavy_capacity(options.heavy_capacity);
    if let Some(limit) = options.max_in_flight {
        builder = builder.max_in_flight(limit);
    }
    if let Some(capacity) = options.channel_capacity {
        builder = builder.channel_capacity(capacity);
    }
    let pipeline = builder.build()?;

    let (sender, receiver) = EventChannel::new();

    // One tick per expand result, one per fanout result, one for combine
    let progress = if pretty {
        let pb = ProgressBar::new(options.items.len() as u64 * 2 + 1);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let verbose = options.verbose;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Stage(StageEvent::Started { stage }) if verbose => {
                    pb.println(format!("  {} {}", style("▶").dim(), stage));
                }
                Event::Stage(StageEvent::ItemCompleted(p)) => {
                    pb.inc(1);
                    pb.set_message(p.stage);
                }
                Event::Stage(StageEvent::Drained { report }) if verbose => {
                    pb.println(format!("  {} {}", style("✓").green(), report));
                }
                Event::Stage(StageEvent::Failed { stage, message }) => {
                    pb.println(format!("  {} {}: {}", style("✗").red(), stage, message));
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Cancelled { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = pipeline.run_with_events(options.items.iter().cloned(), &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let result = result?;
    let run_id = result.run_id;
    let duration_ms = result.duration_ms;
    let stages = result.stages.clone();
    let combined = result.into_single()?;

    match options.output {
        OutputFormat::Pretty => print_pretty_results(
            &term,
            &pipeline,
            options.items.len(),
            &combined,
            &stages,
            duration_ms,
            options.verbose,
        ),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "run_id": run_id.to_string(),
                "items": options.items,
                "heavy": pipeline.heavy_name(),
                "light": pipeline.light_name(),
                "heavy_capacity": pipeline.heavy_gate().capacity(),
                "combined": combined,
                "duration_ms": duration_ms,
                "stages": stages,
            });
            println!("{output:#}");
        }
        OutputFormat::Minimal => println!("{combined}"),
    }

    Ok(())
}

fn print_pretty_results(
    term: &Term,
    pipeline: &SignerPipeline,
    item_count: usize,
    combined: &str,
    stages: &[StageReport],
    duration_ms: u64,
    verbose: bool,
) {
    term.write_line(&format!("{} Run Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} items signed in {:.2}s",
        style(item_count).cyan(),
        duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  heavy {} (gate capacity {}), light {} x{}",
        style(pipeline.heavy_name()).yellow(),
        pipeline.heavy_gate().capacity(),
        style(pipeline.light_name()).yellow(),
        FANOUT_WIDTH + 2
    ))
    .ok();

    if verbose {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("Stages:").bold().underlined()))
            .ok();
        for report in stages {
            term.write_line(&format!("  {report}")).ok();
        }
    }

    term.write_line("").ok();
    term.write_line(&format!("{}", style("Combined:").bold())).ok();

    // The combined value goes to stdout so it can be piped
    println!("{combined}");
}

fn list_primitives() {
    for kind in [DigestKind::Md5, DigestKind::Crc32, DigestKind::Xxh3] {
        println!("{:<8} {}", style(kind).bold(), kind.description());
    }
}
