//! Ordering, backpressure and shutdown tests for the pipeline.

use std::{sync::Arc, time::Duration};

use proptest::prelude::*;

use super::{DrainStats, OrderedPipeline, PipelineConfig, PipelineError, ShutdownOutcome};
use crate::{
    test_helpers::{CallLog, RecordingSink, ScriptedTranslator},
    translate::{ProviderKind, ProviderSpec, TranslationRouter},
};

/// Router with one provider whose latency is parsed from `"<ms>:<text>"`.
fn latency_router(log: &CallLog) -> Arc<TranslationRouter> {
    let provider = ScriptedTranslator::new("scripted", log, |input| {
        let (millis, text) = input.split_once(':').unwrap_or(("0", input));
        let millis = millis.parse().unwrap_or(0);
        (Duration::from_millis(millis), Some(format!("t-{text}")))
    });
    Arc::new(
        TranslationRouter::builder()
            .provider(
                ProviderSpec::new(ProviderKind::Custom, "scripted", Duration::from_secs(600)),
                Arc::new(provider),
            )
            .provider_workers(64)
            .build()
            .expect("valid router"),
    )
}

fn config() -> PipelineConfig {
    PipelineConfig {
        workers: 8,
        job_timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(50),
        shutdown_grace: Duration::from_secs(30),
    }
}

#[tokio::test(start_paused = true)]
async fn slow_head_delays_but_does_not_reorder() {
    let log = CallLog::default();
    let sink = RecordingSink::default();
    let pipeline = OrderedPipeline::spawn(latency_router(&log), Arc::new(sink.clone()), config());
    let handle = pipeline.handle();

    handle.submit("A", "500:a").await.expect("submit");
    handle.submit("B", "0:b").await.expect("submit");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sink.lines().is_empty(), "later job must wait for the head");

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(sink.lines(), ["A>>>t-a", "B>>>t-b"]);
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn timed_out_job_is_skipped() {
    let log = CallLog::default();
    let sink = RecordingSink::default();
    let pipeline = OrderedPipeline::spawn(
        latency_router(&log),
        Arc::new(sink.clone()),
        PipelineConfig {
            job_timeout: Duration::from_secs(1),
            ..config()
        },
    );
    let handle = pipeline.handle();

    handle.submit("A", "5000:a").await.expect("submit");
    handle.submit("B", "0:b").await.expect("submit");

    let outcome = pipeline.shutdown().await;
    assert_eq!(sink.lines(), ["B>>>t-b"]);
    assert_eq!(
        outcome,
        ShutdownOutcome::Drained(DrainStats {
            displayed: 1,
            skipped: 0,
            timed_out: 1,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn passthrough_text_is_displayed() {
    let sink = RecordingSink::default();
    let router = Arc::new(TranslationRouter::builder().build().expect("valid router"));
    let pipeline = OrderedPipeline::spawn(router, Arc::new(sink.clone()), config());

    pipeline.handle().submit("Bob", "hola").await.expect("submit");
    pipeline.shutdown().await;
    assert_eq!(sink.lines(), ["Bob>>>hola"]);
}

#[tokio::test(start_paused = true)]
async fn submit_waits_for_a_free_worker() {
    let log = CallLog::default();
    let sink = RecordingSink::default();
    let pipeline = OrderedPipeline::spawn(
        latency_router(&log),
        Arc::new(sink.clone()),
        PipelineConfig {
            workers: 1,
            ..config()
        },
    );
    let handle = pipeline.handle();

    handle.submit("A", "1000:a").await.expect("submit");
    let blocked =
        tokio::time::timeout(Duration::from_millis(500), handle.submit("B", "0:b")).await;
    assert!(blocked.is_err(), "second submit should wait for the worker");

    let sequence = tokio::time::timeout(Duration::from_secs(2), handle.submit("C", "0:c"))
        .await
        .expect("worker freed")
        .expect("submit");
    assert_eq!(sequence.get(), 1);

    pipeline.shutdown().await;
    assert_eq!(sink.lines(), ["A>>>t-a", "C>>>t-c"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_drains_queued_jobs() {
    let log = CallLog::default();
    let sink = RecordingSink::default();
    let pipeline = OrderedPipeline::spawn(latency_router(&log), Arc::new(sink.clone()), config());
    let handle = pipeline.handle();

    for name in ["A", "B", "C"] {
        handle
            .submit(name, format!("1000:{name}"))
            .await
            .expect("submit");
    }

    let outcome = pipeline.shutdown().await;
    assert!(matches!(outcome, ShutdownOutcome::Drained(stats) if stats.displayed == 3));
    assert_eq!(sink.lines(), ["A>>>t-A", "B>>>t-B", "C>>>t-C"]);
    assert_eq!(handle.submit("D", "0:d").await, Err(PipelineError::Closed));
}

#[tokio::test(start_paused = true)]
async fn shutdown_abandons_jobs_after_grace() {
    let log = CallLog::default();
    let sink = RecordingSink::default();
    let pipeline = OrderedPipeline::spawn(
        latency_router(&log),
        Arc::new(sink.clone()),
        PipelineConfig {
            job_timeout: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(1),
            ..config()
        },
    );
    let handle = pipeline.handle();
    handle.submit("A", "30000:a").await.expect("submit");
    handle.submit("B", "0:b").await.expect("submit");

    let outcome = pipeline.shutdown().await;
    assert_eq!(outcome, ShutdownOutcome::GraceElapsed { abandoned: 2 });
    assert!(sink.lines().is_empty());
}

fn line_index(line: &str) -> usize {
    let (name, _) = line.split_once(">>>").expect("formatted line");
    name.trim_start_matches('s').parse().expect("numbered sender")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn display_follows_submission_order(latencies in prop::collection::vec(0u64..400, 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("runtime");
        let job_timeout = Duration::from_millis(250);
        let lines = runtime.block_on(async {
            let log = CallLog::default();
            let sink = RecordingSink::default();
            let pipeline = OrderedPipeline::spawn(
                latency_router(&log),
                Arc::new(sink.clone()),
                PipelineConfig { job_timeout, workers: 4, ..config() },
            );
            let handle = pipeline.handle();
            for (index, millis) in latencies.iter().enumerate() {
                handle
                    .submit(format!("s{index}"), format!("{millis}:{index}"))
                    .await
                    .expect("submit");
            }
            pipeline.shutdown().await;
            sink.lines()
        });

        let shown: Vec<usize> = lines.iter().map(|line| line_index(line)).collect();
        prop_assert!(shown.windows(2).all(|pair| pair[0] < pair[1]));
        for (index, millis) in latencies.iter().enumerate() {
            if Duration::from_millis(*millis) < job_timeout {
                prop_assert!(shown.contains(&index), "fast job {} missing", index);
            }
        }
    }
}
