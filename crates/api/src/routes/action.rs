use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use bson::{DateTime, oid::ObjectId};
use chrono::SecondsFormat;
use safetrack_db::models::AuditLog;
use safetrack_services::actions::{ActionView, CreateAction, ListActions, UpdateAction, UserRef};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::ApiError,
    extractors::{auth::AuthUser, request_meta::RequestMeta},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActionsQuery {
    pub scope: Option<String>,
    pub status: Option<String>,
    pub site_id: Option<String>,
    pub due_date_from: Option<String>,
    pub due_date_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub linked_response_id: Option<String>,
    pub assigned_to_id: Option<String>,
    pub due_date: Option<String>,
}

/// Absent keys stay `None`; explicit `null` becomes `Some(None)`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActionRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub status: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub source_type: String,
    pub source_id: String,
    pub site_id: Option<String>,
    pub linked_response_id: Option<String>,
    pub assigned_to: Option<PersonResponse>,
    pub created_by: Option<PersonResponse>,
    pub due_date: Option<String>,
    pub status: String,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ActionListResponse {
    pub actions: Vec<ActionResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventResponse {
    pub id: String,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: String,
    pub occurred_at: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub events: Vec<AuditEventResponse>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListActionsQuery>,
) -> Result<Json<ActionListResponse>, ApiError> {
    let query = ListActions {
        scope: query.scope,
        status: query.status,
        site_id: query.site_id,
        due_date_from: query.due_date_from,
        due_date_to: query.due_date_to,
    };
    let views = state.actions.list(&auth.actor, &query).await?;

    Ok(Json(ActionListResponse {
        actions: views.into_iter().map(to_response).collect(),
    }))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(action_id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = parse_action_id(&action_id)?;
    let view = state.actions.get(&auth.actor, id).await?;
    Ok(Json(to_response(view)))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    payload: Result<Json<CreateActionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ActionResponse>), ApiError> {
    let Json(body) = payload?;
    let input = CreateAction {
        title: body.title,
        description: body.description,
        source_type: body.source_type,
        source_id: body.source_id,
        linked_response_id: body.linked_response_id,
        assigned_to_id: body.assigned_to_id,
        due_date: body.due_date,
    };

    let view = state
        .actions
        .create(&auth.actor, &input, meta.audit_metadata())
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(view))))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: RequestMeta,
    Path(action_id): Path<String>,
    payload: Result<Json<UpdateActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = parse_action_id(&action_id)?;
    let Json(body) = payload?;
    let input = UpdateAction {
        status: body.status,
        title: body.title,
        description: body.description,
        assigned_to_id: body.assigned_to_id,
        due_date: body.due_date,
    };

    let view = state
        .actions
        .update(&auth.actor, id, &input, meta.audit_metadata())
        .await?;

    Ok(Json(to_response(view)))
}

pub async fn audit_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(action_id): Path<String>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let id = parse_action_id(&action_id)?;
    let events = state.actions.audit_log(&auth.actor, id).await?;

    Ok(Json(AuditLogResponse {
        events: events.into_iter().map(to_event_response).collect(),
    }))
}

fn parse_action_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::Validation("Invalid action ID".to_string()))
}

fn iso(dt: DateTime) -> String {
    dt.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// "Ada Lovelace King" -> ("Ada", "Lovelace King").
fn split_name(display_name: &str) -> (String, String) {
    match display_name.trim().split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (display_name.trim().to_string(), String::new()),
    }
}

fn to_person(user: UserRef) -> PersonResponse {
    let (first_name, last_name) = split_name(&user.display_name);
    PersonResponse {
        id: user.id.to_hex(),
        first_name,
        last_name,
    }
}

fn to_response(view: ActionView) -> ActionResponse {
    let action = view.action;
    ActionResponse {
        id: action.id.map(|id| id.to_hex()).unwrap_or_default(),
        title: action.title,
        description: action.description,
        source_type: action.source.kind().as_str().to_string(),
        source_id: action.source.id().to_hex(),
        site_id: view.site_id.map(|id| id.to_hex()),
        linked_response_id: action.source.linked_response_id().map(|id| id.to_hex()),
        assigned_to: view.assignee.map(to_person),
        created_by: view.creator.map(to_person),
        due_date: action.due_date.map(|d| d.to_string()),
        status: action.status.as_str().to_string(),
        completed_at: action.completed_at.map(iso),
        created_at: iso(action.created_at),
        updated_at: iso(action.updated_at),
    }
}

fn to_event_response(event: AuditLog) -> AuditEventResponse {
    AuditEventResponse {
        id: event.id.map(|id| id.to_hex()).unwrap_or_default(),
        event_type: event.event_type.as_str().to_string(),
        entity_type: event.entity_type,
        entity_id: event.entity_id.to_hex(),
        user_id: event.user_id.to_hex(),
        occurred_at: iso(event.occurred_at),
        old_value: event.old_value,
        new_value: event.new_value,
        metadata: serde_json::json!({
            "ip": event.metadata.ip,
            "userAgent": event.metadata.user_agent,
            "reason": event.metadata.reason,
        }),
    }
}
