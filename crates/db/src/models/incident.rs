use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Read-only view of an incident; the incident module owns the full record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub tenant_id: ObjectId,
    pub site_id: ObjectId,
    pub title: String,
    pub created_at: DateTime,
}

impl Incident {
    pub const COLLECTION: &'static str = "incidents";
}
