use std::collections::HashMap;
use std::sync::Arc;

use bson::{oid::ObjectId, DateTime};
use chrono::{NaiveDate, Utc};
use mongodb::{Client, Database};
use safetrack_db::models::{
    Action, ActionStatus, AuditEventType, AuditLog, AuditMetadata, SourceKind, User,
};
use tracing::{info, warn};

use super::changes::{apply_patch, classify, created_snapshot};
use super::validation::{parse_date, parse_id, validate_create, validate_update, CreateAction, UpdateAction};
use crate::audit::{entity_event, AuditRecorder};
use crate::dao::action::{ActionDao, ActionFilter};
use crate::dao::base::{DaoError, DaoResult};
use crate::dao::source::{SiteIndex, SourceDao};
use crate::dao::user::UserDao;
use crate::notify::NotificationDispatcher;
use crate::policy::{self, Actor};

/// Display reference to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRef {
    pub id: ObjectId,
    pub display_name: String,
}

/// An action together with the data callers display next to it.
#[derive(Debug, Clone)]
pub struct ActionView {
    pub action: Action,
    /// Site of the source entity; `None` if the source has since vanished.
    pub site_id: Option<ObjectId>,
    pub assignee: Option<UserRef>,
    pub creator: Option<UserRef>,
}

/// Raw list query, as received.
#[derive(Debug, Clone, Default)]
pub struct ListActions {
    pub scope: Option<String>,
    pub status: Option<String>,
    pub site_id: Option<String>,
    pub due_date_from: Option<String>,
    pub due_date_to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    My,
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub scope: Scope,
    pub status: Option<ActionStatus>,
    pub site_id: Option<ObjectId>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
}

impl ListActions {
    pub fn parse(&self) -> DaoResult<ParsedQuery> {
        let scope = match present(&self.scope) {
            None | Some("my") => Scope::My,
            Some("all") => Scope::All,
            Some(_) => return Err(DaoError::Validation("Invalid scope".to_string())),
        };
        let status = present(&self.status)
            .map(|s| {
                s.parse::<ActionStatus>()
                    .map_err(|_| DaoError::Validation("Invalid status filter".to_string()))
            })
            .transpose()?;
        let site_id = present(&self.site_id)
            .map(|s| parse_id(s, "Invalid site ID"))
            .transpose()?;
        let due_from = present(&self.due_date_from)
            .map(|s| {
                parse_date(s).ok_or_else(|| DaoError::Validation("Invalid dueDateFrom".to_string()))
            })
            .transpose()?;
        let due_to = present(&self.due_date_to)
            .map(|s| {
                parse_date(s).ok_or_else(|| DaoError::Validation("Invalid dueDateTo".to_string()))
            })
            .transpose()?;

        Ok(ParsedQuery {
            scope,
            status,
            site_id,
            due_from,
            due_to,
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Orchestrates action mutations: validate, authorize, write the action and
/// its audit event in one transaction, then hand off to notifications.
pub struct ActionService {
    client: Client,
    actions: ActionDao,
    sources: SourceDao,
    users: Arc<UserDao>,
    audit: AuditRecorder,
    dispatcher: NotificationDispatcher,
}

impl ActionService {
    pub fn new(db: &Database, users: Arc<UserDao>, dispatcher: NotificationDispatcher) -> Self {
        Self {
            client: db.client().clone(),
            actions: ActionDao::new(db),
            sources: SourceDao::new(db),
            users,
            audit: AuditRecorder::new(db),
            dispatcher,
        }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        input: &CreateAction,
        metadata: AuditMetadata,
    ) -> DaoResult<ActionView> {
        if !policy::can_create(actor) {
            return Err(DaoError::Forbidden(
                "Only managers and admins can create actions".to_string(),
            ));
        }
        let new = validate_create(input, Utc::now().date_naive())?;

        let kind = new.source.kind();
        if !self
            .sources
            .exists(actor.tenant_id, kind, new.source.id())
            .await?
        {
            return Err(DaoError::InvalidSource(match kind {
                SourceKind::Incident => "Incident not found".to_string(),
                SourceKind::Inspection => "Inspection not found".to_string(),
            }));
        }
        if let Some(response_id) = new.source.linked_response_id() {
            if !self
                .sources
                .response_belongs_to(response_id, new.source.id())
                .await?
            {
                return Err(DaoError::InvalidSource(
                    "Linked response not found for this inspection".to_string(),
                ));
            }
        }
        self.ensure_assignee(actor.tenant_id, new.assigned_to).await?;

        let now = DateTime::now();
        let action = Action {
            id: None,
            tenant_id: actor.tenant_id,
            title: new.title,
            description: new.description,
            source: new.source,
            assigned_to: new.assigned_to,
            created_by: actor.id,
            due_date: new.due_date,
            status: ActionStatus::Open,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        let written = async {
            let action = self.actions.insert(action, &mut session).await?;
            let id = action.id.ok_or(DaoError::NotFound)?;
            let event = entity_event(
                actor,
                AuditEventType::Created,
                Action::ENTITY_TYPE,
                id,
                None,
                Some(created_snapshot(&action)),
                metadata,
            );
            self.audit.record(&event, &mut session).await?;
            Ok::<_, DaoError>(action)
        }
        .await;
        let action = match written {
            Ok(action) => {
                session.commit_transaction().await?;
                action
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    warn!(error = %abort, "Failed to abort action create transaction");
                }
                return Err(e);
            }
        };

        info!(action_id = ?action.id, actor_id = %actor.id, "Action created");
        self.dispatcher
            .dispatch_assigned(&action, action.assigned_to, actor);
        Ok(self.committed_view(action).await)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: ObjectId,
        input: &UpdateAction,
        metadata: AuditMetadata,
    ) -> DaoResult<ActionView> {
        let current = self.actions.find_in_tenant(actor.tenant_id, id).await?;
        if !policy::can_update(actor, &current, input.requested_fields()) {
            let message = if current.assigned_to != actor.id {
                "You can only update actions assigned to you"
            } else {
                "Workers can only update the status of their assigned actions"
            };
            return Err(DaoError::Forbidden(message.to_string()));
        }

        let patch = validate_update(input)?;
        if let Some(assignee) = patch.assigned_to {
            self.ensure_assignee(actor.tenant_id, assignee).await?;
        }

        let applied = apply_patch(&current, &patch, DateTime::now());
        let Some(event_type) = classify(applied.changed) else {
            return self.view(current).await;
        };

        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        let written = async {
            self.actions
                .save_changes(&applied.action, applied.changed, &mut session)
                .await?;
            let event = entity_event(
                actor,
                event_type,
                Action::ENTITY_TYPE,
                id,
                Some(applied.old_value.clone()),
                Some(applied.new_value.clone()),
                metadata,
            );
            self.audit.record(&event, &mut session).await
        }
        .await;
        match written {
            Ok(()) => session.commit_transaction().await?,
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    warn!(error = %abort, "Failed to abort action update transaction");
                }
                return Err(e);
            }
        }

        info!(
            action_id = %id,
            actor_id = %actor.id,
            event_type = event_type.as_str(),
            "Action updated"
        );

        let status_changed = applied.status_changed();
        let reassigned = applied.reassigned();
        let action = applied.action;
        if status_changed && action.status == ActionStatus::Done {
            self.dispatcher.dispatch_status_changed(
                &action,
                current.status,
                action.status,
                action.created_by,
                actor,
            );
        }
        if reassigned {
            self.dispatcher
                .dispatch_reassigned(&action, action.assigned_to, actor);
        }

        Ok(self.committed_view(action).await)
    }

    pub async fn get(&self, actor: &Actor, id: ObjectId) -> DaoResult<ActionView> {
        let action = self.readable(actor, id).await?;
        self.view(action).await
    }

    /// Newest first.
    pub async fn list(&self, actor: &Actor, query: &ListActions) -> DaoResult<Vec<ActionView>> {
        let query = query.parse()?;
        if query.scope == Scope::All && !policy::can_list_all(actor) {
            return Err(DaoError::Forbidden(
                "Only managers and admins can list all actions".to_string(),
            ));
        }

        let site = match query.site_id {
            Some(site_id) => Some(self.sources.at_site(actor.tenant_id, site_id).await?),
            None => None,
        };
        let filter = ActionFilter {
            assigned_to: (query.scope == Scope::My).then_some(actor.id),
            status: query.status,
            due_from: query.due_from,
            due_to: query.due_to,
            site,
        };

        let actions = self.actions.list(actor.tenant_id, &filter).await?;
        self.view_many(actions).await
    }

    /// Audit trail of one action, newest first. Same read rule as `get`.
    pub async fn audit_log(&self, actor: &Actor, id: ObjectId) -> DaoResult<Vec<AuditLog>> {
        self.readable(actor, id).await?;
        self.audit.history(Action::ENTITY_TYPE, id).await
    }

    async fn readable(&self, actor: &Actor, id: ObjectId) -> DaoResult<Action> {
        let action = self.actions.find_in_tenant(actor.tenant_id, id).await?;
        if !policy::can_read(actor, &action) {
            return Err(DaoError::Forbidden(
                "You can only view actions assigned to you".to_string(),
            ));
        }
        Ok(action)
    }

    async fn ensure_assignee(&self, tenant_id: ObjectId, user_id: ObjectId) -> DaoResult<()> {
        match self.users.find_active_in_tenant(tenant_id, user_id).await? {
            Some(_) => Ok(()),
            None => Err(DaoError::Validation("Assigned user not found".to_string())),
        }
    }

    async fn view(&self, action: Action) -> DaoResult<ActionView> {
        let lookups = self.lookups(std::slice::from_ref(&action)).await?;
        Ok(lookups.view(action))
    }

    async fn view_many(&self, actions: Vec<Action>) -> DaoResult<Vec<ActionView>> {
        let lookups = self.lookups(&actions).await?;
        Ok(actions
            .into_iter()
            .map(|action| lookups.view(action))
            .collect())
    }

    /// View of an action whose write has already committed.
    async fn committed_view(&self, action: Action) -> ActionView {
        let lookups = self.lookups(std::slice::from_ref(&action)).await;
        settle_view(action, lookups)
    }

    async fn lookups(&self, actions: &[Action]) -> DaoResult<Lookups> {
        let sites = self
            .sources
            .site_index(actions.iter().map(|a| &a.source))
            .await?;

        let mut user_ids: Vec<ObjectId> = actions
            .iter()
            .flat_map(|a| [a.assigned_to, a.created_by])
            .collect();
        user_ids.sort();
        user_ids.dedup();
        let users = self
            .users
            .find_by_ids(user_ids)
            .await?
            .iter()
            .filter_map(|u: &User| {
                u.id.map(|id| {
                    (
                        id,
                        UserRef {
                            id,
                            display_name: u.display_name.clone(),
                        },
                    )
                })
            })
            .collect();

        Ok(Lookups { sites, users })
    }
}

struct Lookups {
    sites: SiteIndex,
    users: HashMap<ObjectId, UserRef>,
}

impl Lookups {
    fn view(&self, action: Action) -> ActionView {
        ActionView {
            site_id: self
                .sites
                .get(&(action.source.kind(), action.source.id()))
                .copied(),
            assignee: self.users.get(&action.assigned_to).cloned(),
            creator: self.users.get(&action.created_by).cloned(),
            action,
        }
    }
}

/// The write stands even when the display look-ups fail, so a failed
/// enrichment degrades to a bare view instead of an error.
fn settle_view(action: Action, lookups: DaoResult<Lookups>) -> ActionView {
    match lookups {
        Ok(lookups) => lookups.view(action),
        Err(e) => {
            warn!(action_id = ?action.id, error = %e, "Action saved but view enrichment failed");
            ActionView {
                action,
                site_id: None,
                assignee: None,
                creator: None,
            }
        }
    }
}
