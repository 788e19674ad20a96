use bson::{doc, oid::ObjectId, DateTime};
use mongodb::{ClientSession, Database};
use safetrack_db::models::{AuditEventType, AuditLog, AuditMetadata};
use serde_json::{Map, Value};
use tracing::debug;

use crate::dao::base::{BaseDao, DaoResult};
use crate::policy::Actor;

/// Only the keys that changed, keyed by their wire names.
pub type FieldDiff = Map<String, Value>;

/// Appends audit events. Events are written through the caller's session so
/// they commit or roll back together with the mutation they describe.
pub struct AuditRecorder {
    base: BaseDao<AuditLog>,
}

impl AuditRecorder {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, AuditLog::COLLECTION),
        }
    }

    pub async fn record(&self, event: &AuditLog, session: &mut ClientSession) -> DaoResult<()> {
        self.base.insert_one_in(event, session).await?;
        debug!(
            event_type = event.event_type.as_str(),
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            "Audit event recorded"
        );
        Ok(())
    }

    /// Newest first.
    pub async fn history(&self, entity_type: &str, entity_id: ObjectId) -> DaoResult<Vec<AuditLog>> {
        self.base
            .find_many(
                doc! { "entity_type": entity_type, "entity_id": entity_id },
                Some(doc! { "occurred_at": -1, "_id": -1 }),
            )
            .await
    }
}

/// Builds an event describing a change made by `actor` to one entity.
pub fn entity_event(
    actor: &Actor,
    event_type: AuditEventType,
    entity_type: &str,
    entity_id: ObjectId,
    old_value: Option<FieldDiff>,
    new_value: Option<FieldDiff>,
    metadata: AuditMetadata,
) -> AuditLog {
    AuditLog {
        id: None,
        tenant_id: actor.tenant_id,
        event_type,
        entity_type: entity_type.to_string(),
        entity_id,
        user_id: actor.id,
        old_value: old_value.map(Value::Object),
        new_value: new_value.map(Value::Object),
        metadata,
        occurred_at: DateTime::now(),
    }
}
