use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::NaiveDate;
use mongodb::{ClientSession, Database};
use safetrack_db::models::{Action, ActionStatus, SourceKind};

use super::base::{BaseDao, DaoError, DaoResult};
use super::source::SiteSources;
use crate::policy::ActionFields;

/// Criteria for listing actions inside one tenant. Every populated criterion
/// narrows the result.
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub assigned_to: Option<ObjectId>,
    pub status: Option<ActionStatus>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    /// Resolved sources at the requested site. An action has no site of its
    /// own; it inherits the site of its incident or inspection.
    pub site: Option<SiteSources>,
}

impl ActionFilter {
    pub fn to_document(&self, tenant_id: ObjectId) -> Document {
        let mut filter = doc! { "tenant_id": tenant_id };

        if let Some(user_id) = self.assigned_to {
            filter.insert("assigned_to", user_id);
        }
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }

        let mut due = Document::new();
        if let Some(from) = self.due_from {
            due.insert("$gte", from.to_string());
        }
        if let Some(to) = self.due_to {
            due.insert("$lte", to.to_string());
        }
        if !due.is_empty() {
            filter.insert("due_date", due);
        }

        if let Some(site) = &self.site {
            filter.insert(
                "$or",
                vec![
                    doc! {
                        "source.type": SourceKind::Incident.as_str(),
                        "source.id": { "$in": site.incident_ids.clone() },
                    },
                    doc! {
                        "source.type": SourceKind::Inspection.as_str(),
                        "source.id": { "$in": site.inspection_ids.clone() },
                    },
                ],
            );
        }

        filter
    }
}

pub struct ActionDao {
    pub base: BaseDao<Action>,
}

impl ActionDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Action::COLLECTION),
        }
    }

    /// Inserts within `session` and returns the action with its id filled in.
    pub async fn insert(&self, mut action: Action, session: &mut ClientSession) -> DaoResult<Action> {
        let id = self.base.insert_one_in(&action, session).await?;
        action.id = Some(id);
        Ok(action)
    }

    pub async fn find_in_tenant(&self, tenant_id: ObjectId, id: ObjectId) -> DaoResult<Action> {
        self.base.find_by_id_in_tenant(tenant_id, id).await
    }

    /// Persists the `changed` fields of `action` within `session`.
    /// A status change always carries `completed_at` with it.
    pub async fn save_changes(
        &self,
        action: &Action,
        changed: ActionFields,
        session: &mut ClientSession,
    ) -> DaoResult<()> {
        let id = action.id.ok_or(DaoError::NotFound)?;
        let set = changed_fields_document(action, changed)?;
        self.base
            .update_by_id_in(id, doc! { "$set": set }, session)
            .await?;
        Ok(())
    }

    /// Newest first.
    pub async fn list(&self, tenant_id: ObjectId, filter: &ActionFilter) -> DaoResult<Vec<Action>> {
        self.base
            .find_many(filter.to_document(tenant_id), Some(doc! { "created_at": -1, "_id": -1 }))
            .await
    }
}

fn changed_fields_document(action: &Action, changed: ActionFields) -> DaoResult<Document> {
    let mut set = doc! { "updated_at": action.updated_at };
    if changed.contains(ActionFields::STATUS) {
        set.insert("status", bson::to_bson(&action.status)?);
        set.insert("completed_at", Bson::from(action.completed_at));
    }
    if changed.contains(ActionFields::TITLE) {
        set.insert("title", action.title.clone());
    }
    if changed.contains(ActionFields::DESCRIPTION) {
        set.insert("description", Bson::from(action.description.clone()));
    }
    if changed.contains(ActionFields::ASSIGNED_TO) {
        set.insert("assigned_to", action.assigned_to);
    }
    if changed.contains(ActionFields::DUE_DATE) {
        set.insert("due_date", Bson::from(action.due_date.map(|d| d.to_string())));
    }
    Ok(set)
}
