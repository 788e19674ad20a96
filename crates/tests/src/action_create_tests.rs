use bson::oid::ObjectId;
use serde_json::{Value, json};

use crate::fixtures::seed::{action_body, days_from_today};
use crate::fixtures::test_app::TestApp;

#[tokio::test]
async fn manager_creates_action_with_created_audit_event() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("create").await;

    let action = app
        .create_action(
            &org.manager.token,
            action_body("incident", org.incident_a, org.assignee.id),
        )
        .await;

    assert_eq!(action["title"], "Fix guardrail");
    assert_eq!(action["status"], "open");
    assert_eq!(action["sourceType"], "incident");
    assert_eq!(action["sourceId"], org.incident_a.to_hex());
    assert_eq!(action["siteId"], org.site_a.to_hex());
    assert_eq!(action["dueDate"], days_from_today(1));
    assert_eq!(action["completedAt"], Value::Null);
    assert_eq!(action["assignedTo"]["id"], org.assignee.id.to_hex());
    assert_eq!(action["assignedTo"]["firstName"], "Uma");
    assert_eq!(action["assignedTo"]["lastName"], "Worker");
    assert_eq!(action["createdBy"]["id"], org.manager.id.to_hex());

    let id = action["id"].as_str().unwrap();
    let events = app.audit_events(id, &org.manager.token).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["eventType"], "created");
    assert_eq!(events[0]["entityType"], "action");
    assert_eq!(events[0]["userId"], org.manager.id.to_hex());
    assert_eq!(events[0]["newValue"]["status"], "open");
    assert_eq!(events[0]["oldValue"], Value::Null);
}

#[tokio::test]
async fn due_date_in_the_past_is_rejected_without_writing() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("pastdue").await;

    let mut body = action_body("incident", org.incident_a, org.assignee.id);
    body["dueDate"] = json!(days_from_today(-1));

    let resp = app
        .auth_post("/api/actions", &org.manager.token)
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "VALIDATION_ERROR");
    assert_eq!(app.action_count().await, 0);
}

#[tokio::test]
async fn due_today_is_accepted() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("duetoday").await;

    let mut body = action_body("incident", org.incident_a, org.assignee.id);
    body["dueDate"] = json!(days_from_today(0));
    let action = app.create_action(&org.manager.token, body).await;
    assert_eq!(action["dueDate"], days_from_today(0));
}

#[tokio::test]
async fn worker_cannot_create() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("workercreate").await;

    let resp = app
        .auth_post("/api/actions", &org.assignee.token)
        .json(&action_body("incident", org.incident_a, org.assignee.id))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 403);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "FORBIDDEN");
    assert_eq!(app.action_count().await, 0);
}

#[tokio::test]
async fn unknown_source_is_invalid_source() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("nosource").await;

    let resp = app
        .auth_post("/api/actions", &org.manager.token)
        .json(&action_body("inspection", ObjectId::new(), org.assignee.id))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "INVALID_SOURCE");
}

#[tokio::test]
async fn source_in_another_tenant_is_invalid_source() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("tenant-a").await;
    let other = app.seed_org("tenant-b").await;

    let resp = app
        .auth_post("/api/actions", &org.manager.token)
        .json(&action_body("incident", other.incident_a, org.assignee.id))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "INVALID_SOURCE");
}

#[tokio::test]
async fn linked_response_with_incident_source_is_validation_error() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("linkincident").await;

    let mut body = action_body("incident", org.incident_a, org.assignee.id);
    body["linkedResponseId"] = json!(org.response_a.to_hex());

    let resp = app
        .auth_post("/api/actions", &org.manager.token)
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "VALIDATION_ERROR");
    assert_eq!(app.action_count().await, 0);
}

#[tokio::test]
async fn linked_response_must_belong_to_the_inspection() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("linkmismatch").await;

    let mut body = action_body("inspection", org.inspection_b, org.assignee.id);
    body["linkedResponseId"] = json!(org.response_a.to_hex());

    let resp = app
        .auth_post("/api/actions", &org.manager.token)
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "INVALID_SOURCE");

    let mut body = action_body("inspection", org.inspection_a, org.assignee.id);
    body["linkedResponseId"] = json!(org.response_a.to_hex());
    let action = app.create_action(&org.manager.token, body).await;
    assert_eq!(action["linkedResponseId"], org.response_a.to_hex());
    assert_eq!(action["siteId"], org.site_a.to_hex());
}

#[tokio::test]
async fn unknown_assignee_is_validation_error() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("noassignee").await;

    let resp = app
        .auth_post("/api/actions", &org.manager.token)
        .json(&action_body("incident", org.incident_a, ObjectId::new()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "VALIDATION_ERROR");
    assert_eq!(json["message"], "Assigned user not found");
}

#[tokio::test]
async fn missing_title_and_bad_source_type_are_rejected() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("badinput").await;

    let mut no_title = action_body("incident", org.incident_a, org.assignee.id);
    no_title.as_object_mut().unwrap().remove("title");
    let mut bad_type = action_body("incident", org.incident_a, org.assignee.id);
    bad_type["sourceType"] = json!("audit");
    let mut long_title = action_body("incident", org.incident_a, org.assignee.id);
    long_title["title"] = json!("x".repeat(256));

    for body in [no_title, bad_type, long_title] {
        let resp = app
            .auth_post("/api/actions", &org.manager.token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["error"], "VALIDATION_ERROR");
    }
    assert_eq!(app.action_count().await, 0);
}
