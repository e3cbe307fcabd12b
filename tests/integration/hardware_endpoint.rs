//! Hardware endpoint failure classification through the engine.

use std::time::Duration;

use chrono::Utc;
use pillminder::config::HardwareConfig;
use pillminder::engine::HardwareOutcome;
use pillminder::hardware::{DispatchError, HardwareTrigger, HttpDispatcher, TriggerAction};
use pillminder::reminder::Reminder;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::rig;

fn due_now(id: &str, box_id: u32) -> Reminder {
    Reminder::new("Aspirin", "health")
        .with_id(id)
        .with_box(box_id)
        .with_date(Utc::now())
}

#[tokio::test]
async fn endpoint_error_is_an_outcome_not_a_failure_of_add() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trigger/9"))
        .respond_with(ResponseTemplate::new(500).set_body_string("motor jammed"))
        .mount(&server)
        .await;
    let rig = rig(&server);

    let outcome = rig.engine.add(due_now("r9", 9)).await.unwrap();
    match outcome.hardware {
        HardwareOutcome::Failed { kind, message } => {
            assert_eq!(kind, "endpoint_error");
            assert!(message.contains("motor jammed"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(rig.engine.get("r9").is_some());
}

#[tokio::test]
async fn unreachable_controller_is_classified() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dispatcher = HttpDispatcher::new(
        HardwareConfig::new(format!("http://{addr}")).with_timeout_ms(2_000),
    );
    let err = dispatcher
        .dispatch(&due_now("r1", 1), TriggerAction::Start)
        .await
        .unwrap_err();
    assert!(
        matches!(err, DispatchError::NetworkUnreachable(_)),
        "got {err:?}"
    );
}

#[tokio::test]
async fn stop_carries_explicit_action_and_json_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trigger/4"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = HttpDispatcher::new(
        HardwareConfig::new(server.uri()).with_timeout_ms(2_000),
    );
    let ack = dispatcher
        .dispatch(&due_now("r4", 4), TriggerAction::Stop)
        .await
        .unwrap();
    assert_eq!(ack.status, 204);
    assert!(ack.body.is_null());

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["action"], "stop");
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn slow_controller_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let dispatcher = HttpDispatcher::new(HardwareConfig::new(server.uri()).with_timeout_ms(200));
    let started = std::time::Instant::now();
    let err = dispatcher
        .dispatch(&due_now("r1", 1), TriggerAction::Start)
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Timeout);
    assert!(started.elapsed() < Duration::from_secs(4));
}
