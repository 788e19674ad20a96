use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bson::doc;
use safetrack_db::models::AuditLog;
use safetrack_services::notify::{
    NotificationError, NotificationKind, NotificationPayload, NotificationSink,
};
use serde_json::{Value, json};

use crate::fixtures::seed::action_body;
use crate::fixtures::test_app::TestApp;

/// Makes every later insert into the audit collection fail schema validation.
async fn reject_audit_writes(app: &TestApp) {
    app.db
        .run_command(doc! {
            "collMod": AuditLog::COLLECTION,
            "validator": {
                "$jsonSchema": { "bsonType": "object", "required": ["never_present"] }
            },
            "validationLevel": "strict",
            "validationAction": "error",
        })
        .await
        .expect("Failed to install audit validator");
}

#[tokio::test]
async fn failed_audit_write_rolls_back_create() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("rollbackcreate").await;
    reject_audit_writes(&app).await;

    let resp = app
        .auth_post("/api/actions", &org.manager.token)
        .json(&action_body("incident", org.incident_a, org.assignee.id))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 500);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "INTERNAL_ERROR");
    assert_eq!(app.action_count().await, 0);
}

#[tokio::test]
async fn failed_audit_write_rolls_back_update() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("rollbackupdate").await;
    let action = app
        .create_action(
            &org.manager.token,
            action_body("incident", org.incident_a, org.assignee.id),
        )
        .await;
    let id = action["id"].as_str().unwrap();
    reject_audit_writes(&app).await;

    let resp = app
        .auth_put(&format!("/api/actions/{id}"), &org.assignee.token)
        .json(&json!({ "status": "done" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "INTERNAL_ERROR");

    let resp = app
        .auth_get(&format!("/api/actions/{id}"), &org.assignee.token)
        .send()
        .await
        .unwrap();
    let stored: Value = resp.json().await.unwrap();
    assert_eq!(stored["status"], "open");
    assert_eq!(stored["completedAt"], Value::Null);
    assert_eq!(stored["updatedAt"], action["updatedAt"]);
    assert_eq!(app.audit_events(id, &org.manager.token).await.len(), 1);
}

/// Notification service that is always down.
#[derive(Default)]
struct UnreachableNotifier {
    attempts: AtomicUsize,
}

#[async_trait]
impl NotificationSink for UnreachableNotifier {
    async fn send(
        &self,
        _kind: NotificationKind,
        _payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotificationError::Delivery("mail relay unreachable".to_string()))
    }
}

async fn wait_for_attempts(sink: &UnreachableNotifier, expected: usize) -> usize {
    for _ in 0..40 {
        let attempts = sink.attempts.load(Ordering::SeqCst);
        if attempts >= expected {
            return attempts;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    sink.attempts.load(Ordering::SeqCst)
}

#[tokio::test]
async fn notification_failure_never_reaches_the_caller() {
    let sink = Arc::new(UnreachableNotifier::default());
    let shared = sink.clone();
    let app = TestApp::spawn_with_sink(move |_| shared as Arc<dyn NotificationSink>).await;
    let org = app.seed_org("sinkdown").await;

    let action = app
        .create_action(
            &org.manager.token,
            action_body("incident", org.incident_a, org.assignee.id),
        )
        .await;
    let id = action["id"].as_str().unwrap();
    assert_eq!(wait_for_attempts(&sink, 1).await, 1);

    let resp = app
        .auth_put(&format!("/api/actions/{id}"), &org.assignee.token)
        .json(&json!({ "status": "done" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["status"], "done");
    assert_eq!(wait_for_attempts(&sink, 2).await, 2);

    let events = app.audit_events(id, &org.manager.token).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["eventType"], "status_changed");
    assert_eq!(events[1]["eventType"], "created");
}
