use bson::DateTime;
use safetrack_db::models::{Action, ActionStatus, AuditEventType};
use serde_json::{json, Value};

use super::validation::ActionPatch;
use crate::audit::FieldDiff;
use crate::policy::ActionFields;

/// Result of applying a patch to the stored action. `old_value` and
/// `new_value` only carry the fields whose values actually differ.
#[derive(Debug, Clone)]
pub struct AppliedPatch {
    pub action: Action,
    pub changed: ActionFields,
    pub old_value: FieldDiff,
    pub new_value: FieldDiff,
}

impl AppliedPatch {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn status_changed(&self) -> bool {
        self.changed.contains(ActionFields::STATUS)
    }

    pub fn reassigned(&self) -> bool {
        self.changed.contains(ActionFields::ASSIGNED_TO)
    }
}

pub fn apply_patch(current: &Action, patch: &ActionPatch, now: DateTime) -> AppliedPatch {
    let mut applied = AppliedPatch {
        action: current.clone(),
        changed: ActionFields::empty(),
        old_value: FieldDiff::new(),
        new_value: FieldDiff::new(),
    };

    if let Some(status) = patch.status.filter(|s| *s != current.status) {
        applied.record(ActionFields::STATUS, "status", json!(current.status), json!(status));
        applied.action.status = status;
        if status == ActionStatus::Done {
            applied.action.completed_at = Some(now);
        } else if current.status == ActionStatus::Done {
            applied.action.completed_at = None;
        }
    }

    if let Some(title) = patch.title.as_ref().filter(|t| **t != current.title) {
        applied.record(ActionFields::TITLE, "title", json!(current.title), json!(title));
        applied.action.title = title.clone();
    }

    if let Some(description) = patch
        .description
        .as_ref()
        .filter(|d| **d != current.description)
    {
        applied.record(
            ActionFields::DESCRIPTION,
            "description",
            json!(current.description),
            json!(description),
        );
        applied.action.description = description.clone();
    }

    if let Some(assignee) = patch.assigned_to.filter(|a| *a != current.assigned_to) {
        applied.record(
            ActionFields::ASSIGNED_TO,
            "assignedTo",
            json!(current.assigned_to.to_hex()),
            json!(assignee.to_hex()),
        );
        applied.action.assigned_to = assignee;
    }

    if let Some(due_date) = patch.due_date.filter(|d| *d != current.due_date) {
        applied.record(
            ActionFields::DUE_DATE,
            "dueDate",
            date_value(current.due_date),
            date_value(due_date),
        );
        applied.action.due_date = due_date;
    }

    if !applied.is_noop() {
        applied.action.updated_at = now;
    }
    applied
}

impl AppliedPatch {
    fn record(&mut self, field: ActionFields, key: &str, old: Value, new: Value) {
        self.changed |= field;
        self.old_value.insert(key.to_string(), old);
        self.new_value.insert(key.to_string(), new);
    }
}

/// One event per update: a status change wins over any other field change.
pub fn classify(changed: ActionFields) -> Option<AuditEventType> {
    if changed.contains(ActionFields::STATUS) {
        Some(AuditEventType::StatusChanged)
    } else if changed.is_empty() {
        None
    } else {
        Some(AuditEventType::Updated)
    }
}

/// Snapshot stored as `new_value` of the creation event.
pub fn created_snapshot(action: &Action) -> FieldDiff {
    let mut snapshot = FieldDiff::new();
    snapshot.insert("title".to_string(), json!(action.title));
    snapshot.insert("status".to_string(), json!(action.status));
    snapshot.insert("assignedTo".to_string(), json!(action.assigned_to.to_hex()));
    snapshot
}

fn date_value(date: Option<chrono::NaiveDate>) -> Value {
    date.map_or(Value::Null, |d| Value::String(d.to_string()))
}
