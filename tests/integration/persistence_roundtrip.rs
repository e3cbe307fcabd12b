//! Reminder collection survives a restart through the file store.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, SubsecRound, Utc};
use pillminder::ledger::DispatchState;
use pillminder::persistence::{KeyValueStore, REMINDERS_KEY};
use pillminder::reminder::{NotifyType, Reminder, Repeat};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{file_store, rig_with_backend};

#[tokio::test]
async fn restart_restores_reminders_but_not_ledger() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let now = Utc::now();
    let due = (now + ChronoDuration::hours(3)).trunc_subsecs(3);
    {
        let rig = rig_with_backend(&server, Duration::from_secs(2), file_store(&dir));
        rig.engine
            .add_at(
                Reminder::new("Aspirin", "health")
                    .with_id("r1")
                    .with_box(3)
                    .with_notify_type(NotifyType::Hardware)
                    .with_date(due)
                    .with_repeat(Repeat::Daily, None),
                now,
            )
            .await
            .unwrap();
        rig.engine
            .add_at(
                Reminder::new("Dispatched", "health")
                    .with_id("r2")
                    .with_box(4)
                    .with_date(now),
                now,
            )
            .await
            .unwrap();
        rig.engine
            .add_at(Reminder::new("Gone", "misc").with_id("r3"), now)
            .await
            .unwrap();
        assert!(rig.engine.delete("r3"));
        assert_eq!(
            rig.engine.dispatch_state("r2", now),
            Some(DispatchState::Dispatched)
        );
    }

    let rig = rig_with_backend(&server, Duration::from_secs(2), file_store(&dir));
    let all = rig.engine.all();
    let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2"]);

    let r1 = rig.engine.get("r1").unwrap();
    assert_eq!(r1.title, "Aspirin");
    assert_eq!(r1.box_id, Some(3));
    assert_eq!(r1.notify_type, Some(NotifyType::Hardware));
    assert_eq!(r1.date, Some(due));
    assert_eq!(r1.repeat, Some(Repeat::Daily));

    // The ledger is in-memory only.
    assert_eq!(
        rig.engine.dispatch_state("r2", now),
        Some(DispatchState::Eligible)
    );
}

#[tokio::test]
async fn persisted_blob_uses_wire_names() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let backend = file_store(&dir);

    let rig = rig_with_backend(&server, Duration::from_secs(2), backend.clone());
    rig.engine
        .add(Reminder::new("Vitamin D", "health").with_id("v1").with_box(6))
        .await
        .unwrap();

    let blob = backend.get(REMINDERS_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
    assert_eq!(value[0]["id"], "v1");
    assert_eq!(value[0]["box"], 6);
    assert_eq!(value[0]["notifyType"], "both");
    assert_eq!(value[0]["done"], false);
}

#[tokio::test]
async fn corrupt_blob_starts_empty_and_recovers_on_next_save() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let backend = file_store(&dir);
    backend.set(REMINDERS_KEY, "{not json").unwrap();

    let rig = rig_with_backend(&server, Duration::from_secs(2), backend.clone());
    assert!(rig.engine.is_empty());

    rig.engine
        .add(Reminder::new("Fresh", "health").with_id("f1"))
        .await
        .unwrap();
    let blob = backend.get(REMINDERS_KEY).unwrap().unwrap();
    assert!(blob.contains("\"f1\""));
}
