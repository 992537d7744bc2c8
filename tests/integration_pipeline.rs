//! Integration tests for the signing pipeline.
//!
//! These tests verify end-to-end behavior including:
//! - Deterministic output regardless of scheduling
//! - Heavy digest serialization under load
//! - All-or-nothing failure and cancellation

use signal_pipeline::core::digest::{
    Crc32Digest, Digest, DigestConfig, DigestKind, InstrumentedDigest, Md5Digest, SharedDigest,
};
use signal_pipeline::core::pipeline::{CancellationToken, SignerPipeline};
use signal_pipeline::core::stages::{combine, FANOUT_WIDTH};
use signal_pipeline::error::{DigestError, PipelineError};
use signal_pipeline::events::{Event, EventChannel, PipelineEvent, StageEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn reversing() -> SharedDigest {
    Arc::new(|s: &str| s.chars().rev().collect::<String>())
}

fn tagging(tag: &'static str) -> SharedDigest {
    Arc::new(move |s: &str| format!("{tag}({s})"))
}

/// Light digest whose latency depends on the input, so completion order
/// differs from submission order
fn jittery() -> SharedDigest {
    Arc::new(|s: &str| {
        let weight: u64 = s.bytes().map(u64::from).sum();
        std::thread::sleep(Duration::from_millis(weight % 7));
        format!("j{s}")
    })
}

/// Reference value for one item under the real primitives
fn reference_segment(item: &str) -> String {
    let heavy = Md5Digest.digest(item).unwrap();
    let expanded = format!(
        "{}~{}",
        Crc32Digest.digest(item).unwrap(),
        Crc32Digest.digest(&heavy).unwrap()
    );
    (0..6)
        .map(|i| Crc32Digest.digest(&format!("{i}{expanded}")).unwrap())
        .collect()
}

#[test]
fn default_pipeline_matches_reference_for_item_zero() {
    let pipeline = SignerPipeline::builder().build().unwrap();

    let out = pipeline.combine(vec![0u64]).unwrap();

    assert_eq!(out, reference_segment("0"));
}

#[test]
fn default_pipeline_matches_reference_for_seven_items() {
    let pipeline = SignerPipeline::builder().build().unwrap();

    let out = pipeline.combine(0..7u64).unwrap();

    let expected = combine((0..7).map(|i| reference_segment(&i.to_string())).collect(), "_");
    assert_eq!(out, expected);
}

#[test]
fn repeated_runs_produce_identical_output() {
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(jittery())
        .build()
        .unwrap();

    let first = pipeline.combine(0..20u64).unwrap();
    for _ in 0..5 {
        assert_eq!(pipeline.combine(0..20u64).unwrap(), first);
    }
}

#[test]
fn output_does_not_depend_on_input_order() {
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(jittery())
        .build()
        .unwrap();

    let forward = pipeline.combine(vec![3u64, 1, 4, 1, 5, 9, 2, 6]).unwrap();
    let backward = pipeline.combine(vec![6u64, 2, 9, 5, 1, 4, 1, 3]).unwrap();

    assert_eq!(forward, backward);
}

#[test]
fn every_item_contributes_one_segment() {
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(tagging("L"))
        .build()
        .unwrap();

    let out = pipeline.combine(0..25u64).unwrap();

    assert_eq!(out.split('_').count(), 25);
}

#[test]
fn duplicate_items_are_kept() {
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(tagging("L"))
        .build()
        .unwrap();

    let out = pipeline.combine(vec![4u64, 4, 4]).unwrap();
    let segments: Vec<&str> = out.split('_').collect();

    assert_eq!(segments.len(), 3);
    assert!(segments.iter().all(|s| *s == segments[0]));
}

#[test]
fn fanout_segments_keep_prefix_order() {
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(jittery())
        .build()
        .unwrap();

    let out = pipeline.combine(vec![5u64]).unwrap();

    let expanded = "j5~jH(5)";
    let expected: String = (0..6).map(|i| format!("j{i}{expanded}")).collect();
    assert_eq!(out, expected);
}

#[test]
fn reversing_stub_over_three_items() {
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(reversing())
        .build()
        .unwrap();

    let out = pipeline.combine(vec![0u64, 1, 2]).unwrap();

    let segment = |item: &str| {
        let rev = |s: &str| s.chars().rev().collect::<String>();
        let expanded = format!("{}~{}", rev(item), rev(&format!("H({item})")));
        (0..6).map(|i| rev(&format!("{i}{expanded}"))).collect::<String>()
    };
    let mut expected = vec![segment("0"), segment("1"), segment("2")];
    expected.sort();
    assert_eq!(out, expected.join("_"));
}

#[test]
fn heavy_digest_is_never_called_concurrently() {
    let heavy = Arc::new(
        InstrumentedDigest::new(Md5Digest)
            .with_latency(Duration::from_millis(3))
            .reject_overlap(true),
    );
    let light = Arc::new(InstrumentedDigest::new(Crc32Digest));
    let pipeline = SignerPipeline::builder()
        .heavy(heavy.clone())
        .light(light.clone())
        .build()
        .unwrap();

    pipeline.combine(0..40u64).unwrap();

    assert_eq!(heavy.calls(), 40);
    assert_eq!(heavy.peak_concurrency(), 1);
    // two light calls in expand plus six in fanout, per item
    assert_eq!(light.calls(), 40 * 8);
}

#[test]
fn slow_light_digests_overlap_regardless_of_core_count() {
    const ITEMS: u64 = 4;
    let latency = Duration::from_millis(200);
    let light = Arc::new(InstrumentedDigest::new(Crc32Digest).with_latency(latency));
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(light.clone())
        .build()
        .unwrap();

    let started = Instant::now();
    pipeline.combine(0..ITEMS).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(light.calls(), ITEMS as usize * (2 + FANOUT_WIDTH));
    // every expand call of every item is in flight together, and so are
    // all fanout variants
    assert!(light.peak_concurrency() >= 2 * ITEMS as usize);
    assert!(light.peak_concurrency() >= FANOUT_WIDTH);
    // one light round for expand, one for fanout
    assert!(elapsed >= latency * 2);
    assert!(elapsed < latency * 4, "took {elapsed:?}");
}

#[test]
fn separate_pipelines_can_share_one_heavy_gate() {
    let heavy = Arc::new(
        InstrumentedDigest::new(Md5Digest)
            .with_latency(Duration::from_millis(2))
            .reject_overlap(true),
    );
    let first = SignerPipeline::builder().heavy(heavy.clone()).build().unwrap();
    let second = SignerPipeline::builder()
        .heavy(heavy.clone())
        .heavy_gate(Arc::clone(first.heavy_gate()))
        .build()
        .unwrap();

    std::thread::scope(|scope| {
        let a = scope.spawn(|| first.combine(0..15u64));
        let b = scope.spawn(|| second.combine(15..30u64));
        a.join().unwrap().unwrap();
        b.join().unwrap().unwrap();
    });

    assert_eq!(heavy.calls(), 30);
    assert_eq!(heavy.peak_concurrency(), 1);
}

#[test]
fn bounded_channels_and_in_flight_limit_keep_the_result() {
    let unbounded = SignerPipeline::builder().build().unwrap();
    let constrained = SignerPipeline::builder()
        .channel_capacity(0)
        .max_in_flight(2)
        .build()
        .unwrap();

    assert_eq!(
        constrained.combine(0..12u64).unwrap(),
        unbounded.combine(0..12u64).unwrap()
    );
}

#[test]
fn xxh3_light_digest_is_supported() {
    let pipeline = SignerPipeline::builder()
        .digests(DigestConfig::new().light(DigestKind::Xxh3))
        .build()
        .unwrap();

    let out = pipeline.combine(vec![0u64, 1]).unwrap();

    assert_eq!(out.split('_').count(), 2);
    assert!(out.split('_').all(|s| s.chars().all(|c| c.is_ascii_digit())));
}

struct FailsOn(&'static str);

impl Digest for FailsOn {
    fn digest(&self, data: &str) -> Result<String, DigestError> {
        if data == self.0 {
            Err(DigestError::Failed {
                primitive: "flaky".to_string(),
                input: data.to_string(),
                reason: "device unavailable".to_string(),
            })
        } else {
            Ok(format!("ok({data})"))
        }
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[test]
fn heavy_failure_fails_the_whole_run() {
    let pipeline = SignerPipeline::builder()
        .heavy(Arc::new(FailsOn("3")))
        .light(tagging("L"))
        .build()
        .unwrap();

    let err = pipeline.combine(0..7u64).unwrap_err();

    match err {
        PipelineError::Digest(DigestError::Failed { input, .. }) => assert_eq!(input, "3"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn light_failure_in_fanout_fails_the_whole_run() {
    // Only fanout ever sees this input: prefix 2 on item 1
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(Arc::new(FailsOn("2ok(1)~ok(H(1))")))
        .build()
        .unwrap();

    let err = pipeline.combine(0..4u64).unwrap_err();

    assert!(matches!(err, PipelineError::Digest(_)));
}

#[test]
fn failed_run_reports_cancellation_event() {
    let pipeline = SignerPipeline::builder()
        .heavy(Arc::new(FailsOn("0")))
        .light(tagging("L"))
        .build()
        .unwrap();
    let (sender, receiver) = EventChannel::new();

    assert!(pipeline.run_with_events(vec![0u64], &sender).is_err());
    drop(sender);

    let events: Vec<Event> = receiver.iter().collect();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Stage(StageEvent::Failed { stage, .. }) if stage == "expand")));
    assert!(matches!(
        events.last(),
        Some(Event::Pipeline(PipelineEvent::Cancelled { .. }))
    ));
}

#[test]
fn successful_run_reports_every_stage() {
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(tagging("L"))
        .build()
        .unwrap();
    let (sender, receiver) = EventChannel::new();

    let result = pipeline.run_with_events(0..3u64, &sender).unwrap();
    drop(sender);

    let names: Vec<&str> = result.stages.iter().map(|r| r.stage.as_str()).collect();
    assert_eq!(names, ["expand", "fanout", "combine"]);
    assert_eq!(result.stages[0].items_in, 3);
    assert_eq!(result.stages[2].items_out, 1);

    let events: Vec<Event> = receiver.iter().collect();
    assert!(matches!(
        events.first(),
        Some(Event::Pipeline(PipelineEvent::Started { .. }))
    ));
    assert!(matches!(
        events.last(),
        Some(Event::Pipeline(PipelineEvent::Completed { .. }))
    ));
}

#[test]
fn cancelled_run_returns_no_output() {
    let pipeline = SignerPipeline::builder()
        .heavy(tagging("H"))
        .light(tagging("L"))
        .build()
        .unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let result = pipeline.pipeline(0..10u64).cancellation(token).run();

    assert!(matches!(result, Err(PipelineError::Cancelled)));
}

#[test]
fn empty_input_combines_to_empty_string() {
    let pipeline = SignerPipeline::builder().build().unwrap();

    assert_eq!(pipeline.combine(Vec::<u64>::new()).unwrap(), "");
}

#[test]
fn string_items_are_accepted() {
    let pipeline = SignerPipeline::builder().build().unwrap();

    assert_eq!(
        pipeline.combine(vec!["0".to_string()]).unwrap(),
        pipeline.combine(vec![0u64]).unwrap()
    );
}
