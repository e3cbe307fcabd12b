//! End-to-end reminder scenarios against a mock box controller.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use pillminder::engine::HardwareOutcome;
use pillminder::ledger::DispatchState;
use pillminder::reminder::{NotifyType, Reminder};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{next_report, rig, rig_with_backend};

async fn requests_to(server: &MockServer, route: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn future_reminder_gets_one_alert_then_one_start() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trigger/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;
    let mut rig = rig(&server);

    let now = Utc::now();
    let due = now + ChronoDuration::seconds(2);
    let outcome = rig
        .engine
        .add_at(
            Reminder::new("Aspirin", "health")
                .with_id("r1")
                .with_box(3)
                .with_note("with water")
                .with_date(due),
            now,
        )
        .await
        .unwrap();

    assert!(outcome.notification.is_scheduled());
    let alerts = rig.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].fire_at, due);
    assert_eq!(alerts[0].body, "Aspirin");

    assert!(rig.poller.tick_at(now).is_empty());
    assert_eq!(rig.poller.tick_at(due + ChronoDuration::seconds(1)), vec!["r1"]);
    let report = next_report(&mut rig.reports).await;
    assert!(report.outcome.is_dispatched());
    assert!(rig.poller.tick_at(due + ChronoDuration::seconds(4)).is_empty());

    let starts = requests_to(&server, "/trigger/3").await;
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0]["action"], "start");
    assert_eq!(starts[0]["title"], "Aspirin");
    assert_eq!(starts[0]["note"], "with water");
}

#[tokio::test]
async fn stale_reminder_is_never_dispatched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let rig = rig(&server);

    let now = Utc::now();
    let outcome = rig
        .engine
        .add_at(
            Reminder::new("Aspirin", "health")
                .with_id("old")
                .with_box(1)
                .with_date(now - ChronoDuration::minutes(10)),
            now,
        )
        .await
        .unwrap();
    assert!(!outcome.notification.is_scheduled());

    for secs in [0, 3, 6, 60] {
        assert!(rig.poller.tick_at(now + ChronoDuration::seconds(secs)).is_empty());
    }
    assert_eq!(
        rig.engine.dispatch_state("old", now),
        Some(DispatchState::GraceExpired)
    );
}

#[tokio::test]
async fn timed_out_box_does_not_hold_up_others() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trigger/3"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/trigger/4"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let mut rig = rig_with_backend(
        &server,
        Duration::from_millis(300),
        std::sync::Arc::new(pillminder::persistence::MemoryStore::new()),
    );

    let now = Utc::now();
    let due = now + ChronoDuration::seconds(1);
    for (id, box_id) in [("slow", 3), ("fast", 4)] {
        rig.engine
            .add_at(
                Reminder::new(id, "health")
                    .with_id(id)
                    .with_box(box_id)
                    .with_date(due),
                now,
            )
            .await
            .unwrap();
    }

    let started = rig.poller.tick_at(due);
    assert_eq!(started, vec!["slow", "fast"]);

    let first = next_report(&mut rig.reports).await;
    assert_eq!(first.reminder_id, "fast");
    assert!(first.outcome.is_dispatched());

    let second = next_report(&mut rig.reports).await;
    assert_eq!(second.reminder_id, "slow");
    assert!(matches!(
        second.outcome,
        HardwareOutcome::Failed { ref kind, .. } if kind == "timeout"
    ));
}

#[tokio::test]
async fn shared_box_only_active_reminder_fires() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trigger/5"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let mut rig = rig(&server);

    let now = Utc::now();
    let due = now + ChronoDuration::seconds(30);
    let taken = Reminder::new("taken", "health")
        .with_id("taken")
        .with_box(5)
        .with_date(due);
    rig.engine.add_at(taken, now).await.unwrap();
    rig.engine.mark_done("taken").await.unwrap();

    let next = Reminder::new("next", "health")
        .with_id("next")
        .with_box(5)
        .with_date(due);
    rig.engine.add_at(next, now).await.unwrap();

    assert_eq!(rig.poller.tick_at(due), vec!["next"]);
    next_report(&mut rig.reports).await;
    assert!(rig.poller.tick_at(due + ChronoDuration::seconds(3)).is_empty());
}

#[tokio::test]
async fn edit_reopens_and_done_stops() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trigger/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    let mut rig = rig(&server);

    let now = Utc::now();
    let added = rig
        .engine
        .add_at(
            Reminder::new("Insulin", "health")
                .with_id("r2")
                .with_box(2)
                .with_date(now - ChronoDuration::seconds(10)),
            now,
        )
        .await
        .unwrap();
    assert!(added.hardware.is_dispatched());
    assert!(rig.poller.tick_at(now).is_empty());

    let later = now + ChronoDuration::minutes(30);
    rig.engine
        .edit(added.reminder.clone().with_date(later))
        .unwrap()
        .unwrap();
    assert_eq!(rig.poller.tick_at(later), vec!["r2"]);
    next_report(&mut rig.reports).await;

    let done = rig.engine.mark_done("r2").await.unwrap();
    assert!(done.stop.unwrap().is_dispatched());
    assert!(rig.engine.mark_done("r2").await.unwrap().stop.is_none());

    let bodies = requests_to(&server, "/trigger/2").await;
    let actions: Vec<&str> = bodies.iter().map(|b| b["action"].as_str().unwrap()).collect();
    assert_eq!(actions, vec!["start", "start", "stop"]);
}

#[tokio::test]
async fn app_only_reminder_never_reaches_hardware() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let rig = rig(&server);

    let now = Utc::now();
    let due = now + ChronoDuration::seconds(1);
    rig.engine
        .add_at(
            Reminder::new("Stretch", "fitness")
                .with_id("a1")
                .with_box(7)
                .with_notify_type(NotifyType::App)
                .with_date(due),
            now,
        )
        .await
        .unwrap();

    assert_eq!(rig.alerts.alerts().len(), 1);
    assert!(rig.poller.tick_at(due).is_empty());
    let done = rig.engine.mark_done("a1").await.unwrap();
    assert!(done.stop.is_none());
}
