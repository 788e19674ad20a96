use std::{fmt, str::FromStr};

use bson::{oid::ObjectId, DateTime};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unit of corrective work raised against an incident or an inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub tenant_id: ObjectId,
    pub title: String,
    pub description: Option<String>,
    pub source: ActionSource,
    pub assigned_to: ObjectId,
    pub created_by: ObjectId,
    /// Stored as `YYYY-MM-DD` so range filters compare lexicographically.
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ActionStatus,
    /// Non-null exactly when `status == Done`.
    pub completed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Action {
    pub const COLLECTION: &'static str = "actions";
    pub const ENTITY_TYPE: &'static str = "action";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Open,
    InProgress,
    Done,
    Overdue,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Open => "open",
            ActionStatus::InProgress => "in_progress",
            ActionStatus::Done => "done",
            ActionStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ActionStatus::Open),
            "in_progress" => Ok(ActionStatus::InProgress),
            "done" => Ok(ActionStatus::Done),
            "overdue" => Ok(ActionStatus::Overdue),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Incident,
    Inspection,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Incident => "incident",
            SourceKind::Inspection => "inspection",
        }
    }
}

impl FromStr for SourceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incident" => Ok(SourceKind::Incident),
            "inspection" => Ok(SourceKind::Inspection),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

/// The entity an action was raised against. A checklist response can only be
/// linked when the source is an inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SourceDocument", into = "SourceDocument")]
pub enum ActionSource {
    Incident {
        id: ObjectId,
    },
    Inspection {
        id: ObjectId,
        linked_response_id: Option<ObjectId>,
    },
}

impl ActionSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ActionSource::Incident { .. } => SourceKind::Incident,
            ActionSource::Inspection { .. } => SourceKind::Inspection,
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            ActionSource::Incident { id } | ActionSource::Inspection { id, .. } => *id,
        }
    }

    pub fn linked_response_id(&self) -> Option<ObjectId> {
        match self {
            ActionSource::Incident { .. } => None,
            ActionSource::Inspection {
                linked_response_id, ..
            } => *linked_response_id,
        }
    }
}

/// Persisted shape of [`ActionSource`]: `{ type, id, linked_response_id }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_response_id: Option<ObjectId>,
}

#[derive(Debug, Error)]
#[error("linked_response_id is only valid for inspection sources")]
pub struct LinkedResponseOnIncident;

impl TryFrom<SourceDocument> for ActionSource {
    type Error = LinkedResponseOnIncident;

    fn try_from(doc: SourceDocument) -> Result<Self, Self::Error> {
        match doc.kind {
            SourceKind::Incident if doc.linked_response_id.is_some() => {
                Err(LinkedResponseOnIncident)
            }
            SourceKind::Incident => Ok(ActionSource::Incident { id: doc.id }),
            SourceKind::Inspection => Ok(ActionSource::Inspection {
                id: doc.id,
                linked_response_id: doc.linked_response_id,
            }),
        }
    }
}

impl From<ActionSource> for SourceDocument {
    fn from(source: ActionSource) -> Self {
        SourceDocument {
            kind: source.kind(),
            id: source.id(),
            linked_response_id: source.linked_response_id(),
        }
    }
}
