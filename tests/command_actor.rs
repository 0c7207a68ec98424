//! Command actors posting through the HTTP transport to a local listener.

use std::{sync::Arc, time::Duration};

use pokerwire::{
    CommandActor,
    CommandError,
    Rendezvous,
    SessionContext,
    context::{HAND_TOKEN, HandId, TABLE_TOKEN, USER_TOKEN},
    graphql::{self, PLAY_TURN_FIELD},
    model::{Chips, PlayerAction},
    transport::{HttpCommandTransport, TransportError},
};
use rstest::rstest;
use serde_json::{Value, json};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
};

/// One request as the listener received it.
#[derive(Debug)]
struct Received {
    head: String,
    body: Value,
}

/// Serve exactly one HTTP request with `status` and `body`.
async fn serve_once(status: u16, reply_body: &'static str) -> (String, oneshot::Receiver<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        let (head, body) = loop {
            let n = socket.read(&mut buf).await.expect("read");
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).into_owned();
            if let Some((head, body)) = text.split_once("\r\n\r\n") {
                let length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if body.len() >= length {
                    break (head.to_owned(), body.to_owned());
                }
            }
            assert!(n > 0, "client closed before sending a full request");
        };
        let reply = format!(
            "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{reply_body}",
            reply_body.len()
        );
        let _ = tx.send(Received {
            head,
            body: serde_json::from_str(&body).unwrap_or(Value::Null),
        });
        socket.write_all(reply.as_bytes()).await.expect("write");
        socket.shutdown().await.expect("shutdown");
    });
    (format!("http://{addr}/graphql"), rx)
}

fn player(endpoint: String) -> CommandActor {
    let context = SessionContext::new("player_three", "123").with_hand(HandId::new("hand-1"));
    CommandActor::new(Arc::new(HttpCommandTransport::default()), endpoint, context)
}

fn fold() -> graphql::Operation {
    graphql::play_turn(
        &HandId::new("hand-1"),
        &"player_three".into(),
        PlayerAction::Fold,
        Chips::ZERO,
    )
}

#[tokio::test]
async fn posts_operation_with_session_headers() {
    let (endpoint, received) = serve_once(200, r#"{"data":{"playTurn":"hand-1"}}"#).await;
    let reply = player(endpoint)
        .execute(&fold(), Duration::from_secs(5))
        .await
        .expect("accepted");
    assert_eq!(reply.string_field(PLAY_TURN_FIELD), Some("hand-1"));

    let Received { head, body } = received.await.expect("request captured");
    let head = head.to_ascii_lowercase();
    assert!(head.starts_with("post /graphql"));
    for header in [
        format!("{USER_TOKEN}: player_three"),
        format!("{TABLE_TOKEN}: 123"),
        format!("{HAND_TOKEN}: hand-1"),
    ] {
        assert!(head.contains(&header), "missing `{header}` in {head}");
    }
    assert_eq!(body["operationName"], json!("PlayTurn"));
    assert_eq!(body["variables"]["action"], json!("Fold"));
}

#[rstest]
#[case::server_error(500, "oops")]
#[case::graphql_errors(200, r#"{"data":null,"errors":[{"message":"not your turn"}]}"#)]
#[case::not_json(200, "<html></html>")]
#[tokio::test]
async fn refused_commands_are_rejected(#[case] status: u16, #[case] body: &'static str) {
    let (endpoint, _received) = serve_once(status, body).await;
    let err = player(endpoint)
        .execute(&fold(), Duration::from_secs(5))
        .await
        .expect_err("refused");
    let CommandError::Rejected {
        status: got,
        body: got_body,
        operation,
        ..
    } = err
    else {
        panic!("expected a rejection, got {err:?}");
    };
    assert_eq!((got, got_body.as_str(), operation.as_str()), (status, body, "PlayTurn"));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    let err = player(format!("http://{addr}/graphql"))
        .execute(&fold(), Duration::from_secs(5))
        .await
        .expect_err("nobody listening");
    assert!(matches!(
        err,
        CommandError::Transport {
            source: TransportError::Request { .. },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn gate_that_never_opens_sends_nothing() {
    let ready = Rendezvous::new("hand 1: fold:subscribed");
    ready.release();
    let actor = player("http://127.0.0.1:9/graphql".into()).gated(ready, 3, Duration::from_secs(1));
    let err = actor
        .execute(&fold(), Duration::from_secs(5))
        .await
        .expect_err("two parties never arrived");
    assert!(matches!(err, CommandError::NotReady(_)));
    assert!(err.to_string().contains("acquired 1 of 3"));
}
