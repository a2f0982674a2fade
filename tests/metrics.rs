#![cfg(feature = "metrics")]
//! Tests for `chatlens` metrics helpers.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.

use bytes::BytesMut;
use chatlens::{FrameDecoder, metrics as m};
use chatlens_testing::chat_frame;
use metrics::{SharedString, Unit};
use metrics_util::{
    CompositeKey,
    debugging::{DebugValue, DebuggingRecorder, Snapshotter},
};
use rstest::rstest;

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

type Entry = (CompositeKey, Option<Unit>, Option<SharedString>, DebugValue);

/// Take one snapshot; each call resets the recorded counters.
fn snapshot(snapshotter: &Snapshotter) -> Vec<Entry> { snapshotter.snapshot().into_vec() }

fn counter_value(entries: &[Entry], name: &str, label: Option<(&str, &str)>) -> u64 {
    entries
        .iter()
        .filter(|(k, _, _, _)| {
            k.key().name() == name
                && label.is_none_or(|(key, value)| {
                    k.key()
                        .labels()
                        .any(|l| l.key() == key && l.value() == value)
                })
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum()
}

#[test]
fn decoder_counts_messages_and_discards() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xFF, 0xFF]);
        buf.extend_from_slice(&chat_frame("Bob", "hi"));
        let messages = FrameDecoder::default().decode_all(&mut buf);
        assert_eq!(messages.len(), 1);
    });

    let entries = snapshot(&snapshotter);
    assert_eq!(counter_value(&entries, m::FRAMES_DECODED, None), 1);
    assert_eq!(
        counter_value(
            &entries,
            m::FRAMES_DISCARDED,
            Some(("reason", "header_too_long"))
        ),
        1
    );
}

#[rstest]
#[case("translated")]
#[case("passthrough")]
fn translation_outcomes_are_labelled(#[case] outcome: &'static str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || m::inc_translations(outcome));
    assert_eq!(
        counter_value(&snapshot(&snapshotter), m::TRANSLATIONS, Some(("outcome", outcome))),
        1
    );
}

#[test]
fn flow_gauge_tracks_open_flows() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        m::inc_flows();
        m::inc_flows();
        m::dec_flows();
    });
    let gauge = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find(|(k, _, _, _)| k.key().name() == m::FLOWS_ACTIVE)
        .map(|(_, _, _, v)| v);
    assert!(matches!(gauge, Some(DebugValue::Gauge(g)) if g.into_inner() == 1.0));
}

#[test]
fn displayed_lines_are_counted() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, m::inc_lines_displayed);
    assert_eq!(counter_value(&snapshot(&snapshotter), m::LINES_DISPLAYED, None), 1);
}
