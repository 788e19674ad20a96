//! Input checks that run before any look-up or write.

use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, Utc};
use safetrack_db::models::{ActionSource, ActionStatus, SourceKind};
use validator::{Validate, ValidationErrors};

use crate::dao::base::{DaoError, DaoResult};
use crate::policy::ActionFields;

pub const TITLE_MAX_CHARS: u64 = 255;
pub const DESCRIPTION_MAX_CHARS: u64 = 5000;

/// Free-text limits shared by create and update.
#[derive(Debug, Validate)]
struct TextFields {
    #[validate(length(max = TITLE_MAX_CHARS, message = "Title must be at most 255 characters"))]
    title: Option<String>,
    #[validate(length(
        max = DESCRIPTION_MAX_CHARS,
        message = "Description must be at most 5000 characters"
    ))]
    description: Option<String>,
}

/// Raw create request. Every field is optional here so that missing values
/// surface as validation errors rather than decode failures.
#[derive(Debug, Clone, Default)]
pub struct CreateAction {
    pub title: Option<String>,
    pub description: Option<String>,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub linked_response_id: Option<String>,
    pub assigned_to_id: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAction {
    pub title: String,
    pub description: Option<String>,
    pub source: ActionSource,
    pub assigned_to: ObjectId,
    pub due_date: Option<NaiveDate>,
}

/// Raw partial update. The outer `Option` says whether the key was present,
/// the inner one whether it was `null`.
#[derive(Debug, Clone, Default)]
pub struct UpdateAction {
    pub status: Option<Option<String>>,
    pub title: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub assigned_to_id: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
}

impl UpdateAction {
    /// Fields named in the request, whether or not their values differ.
    pub fn requested_fields(&self) -> ActionFields {
        let mut fields = ActionFields::empty();
        fields.set(ActionFields::STATUS, self.status.is_some());
        fields.set(ActionFields::TITLE, self.title.is_some());
        fields.set(ActionFields::DESCRIPTION, self.description.is_some());
        fields.set(ActionFields::ASSIGNED_TO, self.assigned_to_id.is_some());
        fields.set(ActionFields::DUE_DATE, self.due_date.is_some());
        fields
    }
}

/// Typed partial update. `description` and `due_date` may be cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionPatch {
    pub status: Option<ActionStatus>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub assigned_to: Option<ObjectId>,
    pub due_date: Option<Option<NaiveDate>>,
}

pub fn validate_create(input: &CreateAction, today: NaiveDate) -> DaoResult<NewAction> {
    let title = non_empty(input.title.as_deref())
        .ok_or_else(|| invalid("Title is required"))?
        .to_string();
    TextFields {
        title: input.title.clone(),
        description: input.description.clone(),
    }
    .validate()
    .map_err(first_message)?;

    let kind = input
        .source_type
        .as_deref()
        .and_then(|s| s.parse::<SourceKind>().ok())
        .ok_or_else(|| invalid("Invalid source type"))?;
    let source_id = required_id(
        input.source_id.as_deref(),
        "Source ID is required",
        "Invalid source ID",
    )?;
    let assigned_to = required_id(
        input.assigned_to_id.as_deref(),
        "Assigned user is required",
        "Invalid assigned user ID",
    )?;

    let due_date = match non_empty(input.due_date.as_deref()) {
        None => None,
        Some(raw) => {
            let date = parse_date(raw).ok_or_else(|| invalid("Invalid due date"))?;
            if date < today {
                return Err(invalid("Due date cannot be in the past"));
            }
            Some(date)
        }
    };

    let linked_response_id = match non_empty(input.linked_response_id.as_deref()) {
        None => None,
        Some(raw) => Some(parse_id(raw, "Invalid linked response ID")?),
    };
    let source = match (kind, linked_response_id) {
        (SourceKind::Incident, Some(_)) => {
            return Err(invalid(
                "Linked response ID is only valid for inspection actions",
            ));
        }
        (SourceKind::Incident, None) => ActionSource::Incident { id: source_id },
        (SourceKind::Inspection, linked_response_id) => ActionSource::Inspection {
            id: source_id,
            linked_response_id,
        },
    };

    Ok(NewAction {
        title,
        description: input.description.clone().filter(|d| !d.is_empty()),
        source,
        assigned_to,
        due_date,
    })
}

/// Past due dates are accepted on update.
pub fn validate_update(input: &UpdateAction) -> DaoResult<ActionPatch> {
    if input.requested_fields().is_empty() {
        return Err(invalid("No updates provided"));
    }

    let mut patch = ActionPatch::default();

    if let Some(status) = &input.status {
        let status = status
            .as_deref()
            .and_then(|s| s.parse::<ActionStatus>().ok())
            .ok_or_else(|| invalid("Invalid status"))?;
        patch.status = Some(status);
    }

    if let Some(title) = &input.title {
        let trimmed = non_empty(title.as_deref()).ok_or_else(|| invalid("Title is required"))?;
        patch.title = Some(trimmed.to_string());
    }

    TextFields {
        title: input.title.clone().flatten(),
        description: input.description.clone().flatten(),
    }
    .validate()
    .map_err(first_message)?;

    if let Some(description) = &input.description {
        patch.description = Some(description.clone().filter(|d| !d.is_empty()));
    }

    if let Some(assigned_to) = &input.assigned_to_id {
        patch.assigned_to = Some(required_id(
            assigned_to.as_deref(),
            "Assigned user is required",
            "Invalid assigned user ID",
        )?);
    }

    if let Some(due_date) = &input.due_date {
        patch.due_date = Some(match non_empty(due_date.as_deref()) {
            None => None,
            Some(raw) => Some(parse_date(raw).ok_or_else(|| invalid("Invalid due date"))?),
        });
    }

    Ok(patch)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp. A timestamp is
/// reduced to its UTC calendar date, the same calendar "today" uses.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

pub fn parse_id(raw: &str, message: &str) -> DaoResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| invalid(message))
}

fn required_id(raw: Option<&str>, missing: &str, malformed: &str) -> DaoResult<ObjectId> {
    let raw = non_empty(raw).ok_or_else(|| invalid(missing))?;
    parse_id(raw, malformed)
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn first_message(errors: ValidationErrors) -> DaoError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| b.0.cmp(&a.0));
    let message = fields
        .iter()
        .flat_map(|(_, errs)| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string());
    DaoError::Validation(message)
}

fn invalid(message: &str) -> DaoError {
    DaoError::Validation(message.to_string())
}
