use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Append-only record of one observed change to an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub tenant_id: ObjectId,
    pub event_type: AuditEventType,
    pub entity_type: String,
    pub entity_id: ObjectId,
    pub user_id: ObjectId,
    /// Only the keys that changed.
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: AuditMetadata,
    pub occurred_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Created,
    Updated,
    StatusChanged,
    Assigned,
    AttachmentAdded,
    AttachmentRemoved,
    SeverityChanged,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Created => "created",
            AuditEventType::Updated => "updated",
            AuditEventType::StatusChanged => "status_changed",
            AuditEventType::Assigned => "assigned",
            AuditEventType::AttachmentAdded => "attachment_added",
            AuditEventType::AttachmentRemoved => "attachment_removed",
            AuditEventType::SeverityChanged => "severity_changed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditMetadata {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub reason: Option<String>,
}

impl AuditLog {
    pub const COLLECTION: &'static str = "audit_logs";
}
