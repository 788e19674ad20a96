use std::collections::HashSet;

use serde_json::{Value, json};

use crate::fixtures::seed::{action_body, days_from_today};
use crate::fixtures::test_app::TestApp;

fn ids(list: &Value) -> HashSet<String> {
    list["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap().to_string())
        .collect()
}

async fn list(app: &TestApp, token: &str, query: &str) -> (u16, Value) {
    let resp = app
        .auth_get(&format!("/api/actions{query}"), token)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn worker_cannot_read_unassigned_action() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("readperm").await;
    let action = app
        .create_action(
            &org.manager.token,
            action_body("incident", org.incident_a, org.assignee.id),
        )
        .await;
    let id = action["id"].as_str().unwrap();

    let resp = app
        .auth_get(&format!("/api/actions/{id}"), &org.other_worker.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "FORBIDDEN");

    let resp = app
        .auth_get(&format!("/api/actions/{id}/audit-log"), &org.other_worker.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_get(&format!("/api/actions/{id}"), &org.assignee.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn action_in_another_tenant_is_not_found() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("home").await;
    let other = app.seed_org("away").await;
    let action = app
        .create_action(
            &org.manager.token,
            action_body("incident", org.incident_a, org.assignee.id),
        )
        .await;
    let id = action["id"].as_str().unwrap();

    let resp = app
        .auth_get(&format!("/api/actions/{id}"), &other.manager.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn requests_without_valid_token_are_unauthorized() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/api/actions")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "UNAUTHORIZED");

    // Valid signature, but the user does not exist.
    let token = app
        .auth
        .generate_tokens(bson::oid::ObjectId::new(), "ghost@example.com")
        .unwrap()
        .access_token;
    let (status, _) = list(&app, &token, "").await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn scope_my_is_the_default_and_all_needs_a_manager() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("scope").await;
    let mine = app
        .create_action(
            &org.manager.token,
            action_body("incident", org.incident_a, org.assignee.id),
        )
        .await;
    let theirs = app
        .create_action(
            &org.manager.token,
            action_body("incident", org.incident_b, org.other_worker.id),
        )
        .await;

    let (status, json) = list(&app, &org.assignee.token, "").await;
    assert_eq!(status, 200);
    assert_eq!(
        ids(&json),
        HashSet::from([mine["id"].as_str().unwrap().to_string()])
    );

    let (status, json) = list(&app, &org.assignee.token, "?scope=all").await;
    assert_eq!(status, 403);
    assert_eq!(json["error"], "FORBIDDEN");

    let (status, json) = list(&app, &org.manager.token, "?scope=all").await;
    assert_eq!(status, 200);
    assert_eq!(
        ids(&json),
        HashSet::from([
            mine["id"].as_str().unwrap().to_string(),
            theirs["id"].as_str().unwrap().to_string(),
        ])
    );

    // Newest first.
    assert_eq!(json["actions"][0]["id"], theirs["id"]);
}

#[tokio::test]
async fn site_filter_unions_incident_and_inspection_sources() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("site").await;
    let token = &org.manager.token;

    let incident_a = app
        .create_action(token, action_body("incident", org.incident_a, org.assignee.id))
        .await;
    let inspection_a = app
        .create_action(token, action_body("inspection", org.inspection_a, org.assignee.id))
        .await;
    app.create_action(token, action_body("incident", org.incident_b, org.assignee.id))
        .await;
    app.create_action(token, action_body("inspection", org.inspection_b, org.assignee.id))
        .await;

    let (status, json) = list(
        &app,
        token,
        &format!("?scope=all&siteId={}", org.site_a.to_hex()),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(
        ids(&json),
        HashSet::from([
            incident_a["id"].as_str().unwrap().to_string(),
            inspection_a["id"].as_str().unwrap().to_string(),
        ])
    );
    for action in json["actions"].as_array().unwrap() {
        assert_eq!(action["siteId"], org.site_a.to_hex());
    }
}

#[tokio::test]
async fn status_and_due_date_filters() {
    let app = TestApp::spawn().await;
    let org = app.seed_org("filters").await;
    let token = &org.manager.token;

    let mut soon = action_body("incident", org.incident_a, org.assignee.id);
    soon["dueDate"] = json!(days_from_today(2));
    let soon = app.create_action(token, soon).await;

    let mut later = action_body("incident", org.incident_a, org.assignee.id);
    later["dueDate"] = json!(days_from_today(30));
    let later = app.create_action(token, later).await;

    let later_id = later["id"].as_str().unwrap();
    let resp = app
        .auth_put(&format!("/api/actions/{later_id}"), token)
        .json(&json!({ "status": "done" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let (_, json) = list(&app, token, "?scope=all&status=done").await;
    assert_eq!(ids(&json), HashSet::from([later_id.to_string()]));

    let (_, json) = list(
        &app,
        token,
        &format!(
            "?scope=all&dueDateFrom={}&dueDateTo={}",
            days_from_today(2),
            days_from_today(2)
        ),
    )
    .await;
    assert_eq!(
        ids(&json),
        HashSet::from([soon["id"].as_str().unwrap().to_string()])
    );

    let (status, json) = list(&app, token, "?status=closed").await;
    assert_eq!(status, 400);
    assert_eq!(json["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::spawn().await;
    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}
