use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Read-only view of an inspection; the inspection module owns the full record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub tenant_id: ObjectId,
    pub site_id: ObjectId,
    pub created_at: DateTime,
}

/// One answered checklist item of an inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionResponse {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub inspection_id: ObjectId,
    pub item_label: String,
    pub result: String,
    pub created_at: DateTime,
}

impl Inspection {
    pub const COLLECTION: &'static str = "inspections";
}

impl InspectionResponse {
    pub const COLLECTION: &'static str = "inspection_responses";
}
