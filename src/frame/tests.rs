//! Tests for protocol frame encoding and decoding.

use rstest::rstest;
use serde_json::json;

use super::*;

#[test]
fn connection_init_uses_snake_case_type() {
    let frame = ClientFrame::ConnectionInit {
        payload: json!({"x-user-token": "sean", "x-table-token": "123"}),
    };
    let value: serde_json::Value =
        serde_json::from_str(&frame.to_text().expect("encode")).expect("reparse");
    assert_eq!(
        value,
        json!({
            "type": "connection_init",
            "payload": {"x-user-token": "sean", "x-table-token": "123"}
        })
    );
}

#[test]
fn start_frame_matches_wire_layout() {
    let frame = ClientFrame::Start {
        id: "1".into(),
        payload: StartPayload {
            variables: json!({}),
            extensions: json!({}),
            operation_name: "DealSubscription".into(),
            query: "subscription DealSubscription { deal { id } }".into(),
        },
    };
    let value = serde_json::to_value(&frame).expect("encode");
    assert_eq!(value["type"], "start");
    assert_eq!(value["id"], "1");
    assert_eq!(value["payload"]["operationName"], "DealSubscription");
    assert_eq!(value["payload"]["extensions"], json!({}));
}

#[test]
fn terminate_is_a_bare_type() {
    let value = serde_json::to_value(ClientFrame::ConnectionTerminate).expect("encode");
    assert_eq!(value, json!({"type": "connection_terminate"}));
}

#[rstest]
#[case::ack(r#"{"type":"connection_ack"}"#, ControlFrame::ConnectionAck)]
#[case::keepalive(r#"{"type":"ka"}"#, ControlFrame::KeepAlive)]
#[case::start_ack(
    r#"{"type":"start_ack","id":"1"}"#,
    ControlFrame::SubscriptionAck { id: Some("1".into()) }
)]
#[case::unknown(
    r#"{"type":"presence","payload":{}}"#,
    ControlFrame::Other { kind: "presence".into() }
)]
fn control_frames_decode(#[case] text: &str, #[case] expected: ControlFrame) {
    let frame = ServerFrame::decode(text).expect("decode");
    assert_eq!(frame, ServerFrame::Control(expected));
    assert_eq!(frame.kind(), "control");
}

#[test]
fn data_frame_exposes_payload_data() {
    let frame = ServerFrame::decode(
        r#"{"type":"data","id":"1","payload":{"data":{"deal":{"id":"hand-1"}}}}"#,
    )
    .expect("decode");
    let ServerFrame::Data(data) = frame else {
        panic!("expected data frame, got {frame:?}");
    };
    assert_eq!(data.id(), Some("1"));
    assert_eq!(data.data()["deal"]["id"], "hand-1");
    assert!(data.errors().is_none());
    assert_eq!(
        data.to_wire(),
        json!({"type": "data", "id": "1", "payload": {"data": {"deal": {"id": "hand-1"}}}})
    );
}

#[test]
fn data_frame_with_errors_reports_them() {
    let frame = ServerFrame::decode(
        r#"{"type":"data","id":"1","payload":{"data":null,"errors":[{"message":"no table"}]}}"#,
    )
    .expect("decode");
    let ServerFrame::Data(data) = frame else {
        panic!("expected data frame");
    };
    assert_eq!(data.errors().map(<[_]>::len), Some(1));
}

#[rstest]
#[case::object(r#"{"type":"error","id":"1","payload":{"message":"bad query"}}"#, "bad query")]
#[case::list(r#"{"type":"error","id":"1","payload":[{"message":"unknown field"}]}"#, "unknown field")]
#[case::connection(r#"{"type":"connection_error","payload":"unauthorised"}"#, "unauthorised")]
fn error_frames_extract_message(#[case] text: &str, #[case] message: &str) {
    let frame = ServerFrame::decode(text).expect("decode");
    let ServerFrame::Error(error) = frame else {
        panic!("expected error frame");
    };
    assert_eq!(error.message(), message);
}

#[test]
fn malformed_text_is_rejected() {
    assert!(ServerFrame::decode("not json").is_err());
    assert!(ServerFrame::decode(r#"{"id":"1"}"#).is_err());
}
