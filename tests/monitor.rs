//! End-to-end tests replaying captured packets through the monitor.
//!
//! Packets are built with the shared helpers, replayed through
//! [`chatlens::Monitor`] and the lines reaching the display are compared.

use std::time::Duration;

use chatlens::{
    CaptureFilter,
    MonitorConfig,
    capture::PortRange,
    pipeline::{PipelineConfig, ShutdownOutcome},
};
use chatlens_testing::{
    CallLog,
    ScriptedTranslator,
    chat_frame,
    client_packet,
    compressed_chat_frame,
    drive_monitor,
    drive_packets,
    passthrough_router,
    router_with,
    server_packet,
};
use rstest::rstest;

#[tokio::test]
async fn frame_split_mid_header_yields_one_message() {
    let frame = chat_frame("Bob", "hi");
    let lines = drive_packets([server_packet(&frame[..3]), server_packet(&frame[3..])]).await;
    assert_eq!(lines, ["Bob>>>hi"]);
}

#[tokio::test]
async fn both_directions_and_compression_are_decoded() {
    let mut burst = chat_frame("Ana", "one");
    burst.extend(compressed_chat_frame("Ana", "two"));
    let lines = drive_packets([
        server_packet(&burst),
        client_packet(&chat_frame("Me", "three")),
    ])
    .await;
    assert_eq!(lines, ["Ana>>>one", "Ana>>>two", "Me>>>three"]);
}

#[tokio::test]
async fn garbage_prefix_is_resynced() {
    let mut payload = vec![0xFF, 0xFF];
    payload.extend(chat_frame("Bob", "after garbage"));
    let lines = drive_packets([server_packet(&payload)]).await;
    assert_eq!(lines, ["Bob>>>after garbage"]);
}

#[rstest]
#[case::inside(PortRange { min: 11001, max: 11003 }, 1)]
#[case::outside(PortRange { min: 7000, max: 7001 }, 0)]
#[tokio::test]
async fn port_filter_is_applied(#[case] ports: PortRange, #[case] expected: usize) {
    let config = MonitorConfig {
        filter: CaptureFilter {
            host: None,
            ports: Some(ports),
        },
        ..MonitorConfig::default()
    };
    let (report, lines) = drive_monitor(
        [server_packet(&chat_frame("Bob", "hi"))],
        passthrough_router(),
        config,
    )
    .await;
    assert_eq!(lines.len(), expected);
    assert_eq!(report.capture.packets, 1);
    assert_eq!(report.submitted, u64::try_from(expected).expect("small count"));
}

#[tokio::test]
async fn zero_sweep_interval_is_clamped() {
    let config = MonitorConfig {
        sweep_interval: Duration::ZERO,
        ..MonitorConfig::default()
    };
    let (report, lines) = drive_monitor(
        [server_packet(&chat_frame("Bob", "hi"))],
        passthrough_router(),
        config,
    )
    .await;
    assert_eq!(lines, ["Bob>>>hi"]);
    assert_eq!(report.submitted, 1);
}

#[tokio::test]
async fn translations_are_shown_in_capture_order() {
    let log = CallLog::default();
    let provider = ScriptedTranslator::new("scripted", &log, |text| match text {
        "slow" => (Duration::from_millis(300), Some("SLOW".to_owned())),
        other => (Duration::ZERO, Some(other.to_uppercase())),
    });
    let router = router_with([("scripted", provider)], Duration::from_secs(5));

    let mut burst = chat_frame("A", "slow");
    burst.extend(chat_frame("B", "fast"));
    let (report, lines) = drive_monitor(
        [server_packet(&burst), server_packet(&chat_frame("C", "later"))],
        router,
        MonitorConfig::default(),
    )
    .await;

    assert_eq!(lines, ["A>>>SLOW", "B>>>FAST", "C>>>LATER"]);
    assert_eq!(report.submitted, 3);
    assert!(matches!(report.pipeline, ShutdownOutcome::Drained(stats) if stats.displayed == 3));
}

#[tokio::test]
async fn failed_providers_pass_text_through() {
    let log = CallLog::default();
    let router = router_with(
        [
            ("first", ScriptedTranslator::failing("first", &log)),
            ("second", ScriptedTranslator::failing("second", &log)),
        ],
        Duration::from_secs(1),
    );
    let (_, lines) = drive_monitor(
        [server_packet(&chat_frame("Bob", "hola"))],
        router,
        MonitorConfig::default(),
    )
    .await;
    assert_eq!(lines, ["Bob>>>hola"]);
    assert_eq!(log.entries(), ["first:hola", "second:hola"]);
}

#[tokio::test]
async fn stuck_translation_is_skipped_after_job_timeout() {
    let log = CallLog::default();
    let provider = ScriptedTranslator::new("scripted", &log, |text| match text {
        "stuck" => (Duration::from_secs(30), Some("never".to_owned())),
        other => (Duration::ZERO, Some(other.to_owned())),
    });
    let router = router_with([("scripted", provider)], Duration::from_secs(60));
    let config = MonitorConfig {
        pipeline: PipelineConfig {
            job_timeout: Duration::from_millis(200),
            ..PipelineConfig::default()
        },
        ..MonitorConfig::default()
    };

    let mut burst = chat_frame("A", "stuck");
    burst.extend(chat_frame("B", "ok"));
    let (_, lines) = drive_monitor([server_packet(&burst)], router, config).await;
    assert_eq!(lines, ["B>>>ok"]);
}
