//! Unit tests for the stream actor against a scripted channel.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rstest::{fixture, rstest};
use serde_json::json;
use tokio::sync::mpsc;

use super::*;
use crate::{graphql, transport::TransportError};

struct ScriptedChannel {
    inbound: mpsc::UnboundedReceiver<String>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FrameChannel for ScriptedChannel {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent.lock().expect("sent lock").push(text);
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TransportError> { Ok(()) }
}

struct Harness {
    actor: StreamActor,
    inbound: mpsc::UnboundedSender<String>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn push(&self, frame: serde_json::Value) {
        self.inbound.send(frame.to_string()).expect("actor alive");
    }

    fn sent(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .expect("sent lock")
            .iter()
            .map(|text| serde_json::from_str(text).expect("sent frame is json"))
            .collect()
    }
}

#[fixture]
fn harness() -> Harness {
    let (inbound, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let channel = ScriptedChannel {
        inbound: rx,
        sent: Arc::clone(&sent),
    };
    let actor = StreamActor::from_channel(
        Box::new(channel),
        "ws://test/ws",
        SessionContext::new("player_one", "123"),
    );
    Harness {
        actor,
        inbound,
        sent,
    }
}

fn hand_data(id: &str, pot: &str) -> serde_json::Value {
    json!({"type": "data", "id": id, "payload": {"data": {"handEvent": {"pot": pot}}}})
}

#[rstest]
#[tokio::test]
async fn subscribe_assigns_ids_and_releases_after_send(mut harness: Harness) {
    let ready = Rendezvous::new("subscribed");
    harness.actor.initialize().await.expect("handshake");
    let first = harness
        .actor
        .subscribe(&graphql::deal_subscription(), &ready)
        .await
        .expect("subscribe deal");
    let second = harness
        .actor
        .subscribe(&graphql::hand_event_subscription(), &ready)
        .await
        .expect("subscribe hand events");

    assert_eq!((first.as_str(), second.as_str()), ("1", "2"));
    assert_eq!(ready.released(), 2);
    let sent = harness.sent();
    assert_eq!(sent[0]["type"], "connection_init");
    assert_eq!(sent[0]["payload"]["x-user-token"], "player_one");
    assert_eq!(sent[1]["type"], "start");
    assert_eq!(sent[2]["payload"]["operationName"], "HandEventSubscription");
}

#[rstest]
#[tokio::test]
async fn next_skips_control_frames_and_tags_operation(mut harness: Harness) {
    let ready = Rendezvous::new("subscribed");
    harness
        .actor
        .subscribe(&graphql::hand_event_subscription(), &ready)
        .await
        .expect("subscribe");
    harness.push(json!({"type": "connection_ack"}));
    harness.push(json!({"type": "ka"}));
    harness.push(json!({"type": "start_ack", "id": "1"}));
    harness.push(hand_data("1", "30"));

    let frame = harness
        .actor
        .next_data(&NextOptions::operation(graphql::HAND_EVENT_SUBSCRIPTION))
        .await
        .expect("data frame");
    assert_eq!(frame.operation(), Some(graphql::HAND_EVENT_SUBSCRIPTION));
    assert_eq!(frame.data()["handEvent"]["pot"], "30");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn budget_tolerates_exactly_max_ignored_frames(mut harness: Harness) {
    for _ in 0..2 {
        harness.push(json!({"type": "ka"}));
    }
    harness.push(hand_data("1", "30"));
    harness
        .actor
        .next_data(&NextOptions::default().with_max_ignored(2))
        .await
        .expect("two skipped frames are within a budget of two");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn ignored_budget_reports_last_frame(mut harness: Harness) {
    for _ in 0..3 {
        harness.push(json!({"type": "ka"}));
    }
    let err = harness
        .actor
        .next(&NextOptions::default().with_max_ignored(2))
        .await
        .expect_err("budget of two exceeded");
    let StreamError::Timeout(timeout) = err else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(timeout.reason, TimeoutReason::IgnoredBudget);
    assert_eq!(timeout.ignored, 3);
    assert_eq!(timeout.last_frame, Some(json!({"type": "ka"})));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn deadline_fails_instead_of_hanging(mut harness: Harness) {
    harness.push(json!({"type": "ka"}));
    let err = harness
        .actor
        .next(&NextOptions::default().with_timeout(Duration::from_millis(250)))
        .await
        .expect_err("no data ever arrives");
    assert!(matches!(
        err,
        StreamError::Timeout(ProtocolTimeoutError {
            reason: TimeoutReason::Deadline,
            ignored: 1,
            ..
        })
    ));
}

#[rstest]
#[case(json!({"type": "error", "id": "1", "payload": {"message": "not seated"}}), "not seated")]
#[case(
    json!({"type": "data", "id": "1", "payload": {"data": null, "errors": [{"message": "bad hand"}]}}),
    "bad hand"
)]
#[case(json!({"type": "connection_error", "payload": "unauthorised"}), "unauthorised")]
#[tokio::test]
async fn error_frames_fail_immediately(
    mut harness: Harness,
    #[case] frame: serde_json::Value,
    #[case] message: &str,
) {
    harness.push(frame);
    harness.push(hand_data("1", "30"));
    let err = harness
        .actor
        .next(&NextOptions::default())
        .await
        .expect_err("error frame is never skipped");
    let StreamError::Subscription(error) = err else {
        panic!("expected subscription error, got {err:?}");
    };
    assert_eq!(error.message, message);
}

#[rstest]
#[tokio::test]
async fn peer_close_is_a_connection_error(harness: Harness) {
    let Harness { mut actor, inbound, .. } = harness;
    drop(inbound);
    let err = actor
        .next(&NextOptions::default())
        .await
        .expect_err("peer closed");
    assert!(matches!(
        err,
        StreamError::Connection(ConnectionError {
            kind: ConnectionFailure::Closed,
            ..
        })
    ));
}

#[rstest]
#[tokio::test]
async fn malformed_text_is_reported(mut harness: Harness) {
    harness.inbound.send("not json".into()).expect("actor alive");
    let err = harness
        .actor
        .next(&NextOptions::default())
        .await
        .expect_err("undecodable frame");
    assert!(matches!(
        err,
        StreamError::Connection(ConnectionError {
            kind: ConnectionFailure::Malformed(_),
            ..
        })
    ));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn duplicate_frames_remain_for_silence_check(mut harness: Harness) {
    harness.push(hand_data("1", "30"));
    harness.push(json!({"type": "ka"}));
    harness.push(hand_data("1", "30"));

    harness
        .actor
        .next_data(&NextOptions::default())
        .await
        .expect("first copy");
    let extra = harness
        .actor
        .expect_silence(Duration::from_millis(100))
        .await
        .expect("quiet window");
    assert_eq!(extra.len(), 1);
    assert_eq!(extra[0].data()["handEvent"]["pot"], "30");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn next_matching_passes_over_stale_data(mut harness: Harness) {
    harness.push(hand_data("1", "30"));
    harness.push(hand_data("1", "40"));
    harness.push(hand_data("1", "50"));

    let frame = harness
        .actor
        .next_matching(&NextOptions::default().with_max_ignored(0), |frame| {
            frame.data()["handEvent"]["pot"] == "50"
        })
        .await
        .expect("third frame matches");
    assert_eq!(frame.data()["handEvent"]["pot"], "50");
}

#[rstest]
#[tokio::test]
async fn close_terminates_once(mut harness: Harness) {
    harness.actor.unsubscribe("1").await.expect("stop");
    harness.actor.close().await.expect("first close");
    harness.actor.close().await.expect("second close is a no-op");
    let kinds: Vec<_> = harness
        .sent()
        .into_iter()
        .map(|frame| frame["type"].as_str().map(str::to_owned))
        .collect();
    assert_eq!(
        kinds,
        vec![Some("stop".to_owned()), Some("connection_terminate".to_owned())]
    );
}
