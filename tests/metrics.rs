#![cfg(feature = "metrics")]
//! Tests for `pokerwire` metrics.
//!
//! Counters and gauges are observed through
//! `metrics_util::debugging::DebuggingRecorder` installed as the local
//! recorder around a single-threaded runtime.

mod support;

use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use pokerwire::{
    Rendezvous,
    metrics::{COMMANDS_TOTAL, FRAMES_RECEIVED, RENDEZVOUS_STALLS, STREAMS_OPEN},
    scenario::Step,
};
use pokerwire_testing::BackendOptions;
use rstest::rstest;

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("failed to build test runtime")
}

fn counter(snapshotter: &Snapshotter, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, _, _, _)| {
            key.key().name() == name
                && label.is_none_or(|(k, v)| key.key().labels().any(|l| l.key() == k && l.value() == v))
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(c) => c,
            _ => 0,
        })
        .sum()
}

fn gauge(snapshotter: &Snapshotter, name: &str) -> Option<f64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find(|(key, _, _, _)| key.key().name() == name)
        .and_then(|(_, _, _, value)| match value {
            DebugValue::Gauge(g) => Some(g.into_inner()),
            _ => None,
        })
}

#[test]
fn deal_step_counts_commands_and_frames() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        runtime().block_on(async {
            let (_backend, orchestrator) = support::harness(BackendOptions::default());
            let mut state = support::state();
            orchestrator
                .run_step(&Step::deal("hand 1: deal", 2), &mut state)
                .await
                .expect("deal step");
        });
    });

    assert_eq!(counter(&snapshotter, COMMANDS_TOTAL, Some(("outcome", "accepted"))), 1);
    assert_eq!(counter(&snapshotter, FRAMES_RECEIVED, Some(("kind", "data"))), 3);
    assert_eq!(gauge(&snapshotter, STREAMS_OPEN), Some(0.0));
}

#[rstest]
#[case(1)]
#[case(2)]
fn stalled_gates_are_counted(#[case] stalls: u64) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        runtime().block_on(async {
            let ready = Rendezvous::new("subscribed");
            for _ in 0..stalls {
                let _ = ready.acquire("command", Duration::from_millis(10)).await;
            }
        });
    });
    assert_eq!(counter(&snapshotter, RENDEZVOUS_STALLS, None), stalls);
}

#[test]
fn rejected_commands_are_labelled() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        runtime().block_on(async {
            let (_backend, orchestrator) = support::harness(BackendOptions {
                fail_commands: true,
                ..BackendOptions::default()
            });
            let mut state = support::state();
            let _ = orchestrator
                .run_step(&Step::deal("hand 1: deal", 2), &mut state)
                .await;
        });
    });
    assert_eq!(counter(&snapshotter, COMMANDS_TOTAL, Some(("outcome", "rejected"))), 1);
    assert_eq!(counter(&snapshotter, COMMANDS_TOTAL, Some(("outcome", "accepted"))), 0);
}
