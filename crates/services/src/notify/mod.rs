//! Post-commit notification hand-off.
//!
//! Mutations publish a [`DispatchEvent`] once their transaction has
//! committed. A single consumer task drains the channel and spawns one
//! delivery per event, so a slow or failing notification never holds up the
//! request that caused it. Delivery errors are logged and dropped.

pub mod email;
pub mod in_app;

use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::NaiveDate;
use safetrack_db::models::{Action, ActionStatus, SourceKind, User};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dao::base::DaoError;
use crate::dao::user::UserDirectory;
use crate::policy::Actor;

pub use email::EmailNotifier;
pub use in_app::InAppNotifier;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Store error: {0}")]
    Store(#[from] DaoError),
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Assigned,
    StatusChanged,
    Reassigned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Assigned => "assigned",
            NotificationKind::StatusChanged => "status_changed",
            NotificationKind::Reassigned => "reassigned",
        }
    }
}

/// The committed state of the action, copied out so the consumer holds no
/// reference into the request.
#[derive(Debug, Clone)]
pub struct ActionSummary {
    pub id: ObjectId,
    pub tenant_id: ObjectId,
    pub title: String,
    pub status: ActionStatus,
    pub due_date: Option<NaiveDate>,
    pub source_kind: SourceKind,
    pub source_id: ObjectId,
}

impl ActionSummary {
    fn of(action: &Action) -> Option<Self> {
        Some(Self {
            id: action.id?,
            tenant_id: action.tenant_id,
            title: action.title.clone(),
            status: action.status,
            due_date: action.due_date,
            source_kind: action.source.kind(),
            source_id: action.source.id(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ActorRef {
    pub id: ObjectId,
    pub display_name: String,
}

impl From<&Actor> for ActorRef {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id,
            display_name: actor.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Assigned {
        action: ActionSummary,
        assignee: ObjectId,
        actor: ActorRef,
    },
    StatusChanged {
        action: ActionSummary,
        old_status: ActionStatus,
        new_status: ActionStatus,
        owner: ObjectId,
        actor: ActorRef,
    },
    Reassigned {
        action: ActionSummary,
        new_assignee: ObjectId,
        actor: ActorRef,
    },
}

impl DispatchEvent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            DispatchEvent::Assigned { .. } => NotificationKind::Assigned,
            DispatchEvent::StatusChanged { .. } => NotificationKind::StatusChanged,
            DispatchEvent::Reassigned { .. } => NotificationKind::Reassigned,
        }
    }

    pub fn action(&self) -> &ActionSummary {
        match self {
            DispatchEvent::Assigned { action, .. }
            | DispatchEvent::StatusChanged { action, .. }
            | DispatchEvent::Reassigned { action, .. } => action,
        }
    }

    fn actor(&self) -> &ActorRef {
        match self {
            DispatchEvent::Assigned { actor, .. }
            | DispatchEvent::StatusChanged { actor, .. }
            | DispatchEvent::Reassigned { actor, .. } => actor,
        }
    }

    fn recipient_id(&self) -> ObjectId {
        match self {
            DispatchEvent::Assigned { assignee, .. } => *assignee,
            DispatchEvent::StatusChanged { owner, .. } => *owner,
            DispatchEvent::Reassigned { new_assignee, .. } => *new_assignee,
        }
    }
}

/// What a sink receives: the resolved recipient plus the event context.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub recipient: User,
    pub action: ActionSummary,
    pub actor: ActorRef,
    /// `(old, new)` for status changes.
    pub status_change: Option<(ActionStatus, ActionStatus)>,
}

/// The outbound notification service.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError>;
}

/// Delivers to every channel in order. A failing channel is logged and does
/// not stop the ones after it; the first failure is returned.
#[derive(Default)]
pub struct FanOut {
    channels: Vec<(&'static str, Arc<dyn NotificationSink>)>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: &'static str, sink: Arc<dyn NotificationSink>) -> Self {
        self.channels.push((channel, sink));
        self
    }
}

#[async_trait]
impl NotificationSink for FanOut {
    async fn send(
        &self,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        let mut first_error = None;
        for (channel, sink) in &self.channels {
            if let Err(e) = sink.send(kind, payload).await {
                warn!(
                    channel,
                    kind = kind.as_str(),
                    action_id = %payload.action.id,
                    error = %e,
                    "Notification channel failed"
                );
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Recipient gone, or the actor would be notifying themselves.
    Skipped,
}

/// Resolves the recipient's current record and hands the payload to `sink`.
pub async fn deliver(
    event: &DispatchEvent,
    users: &dyn UserDirectory,
    sink: &dyn NotificationSink,
) -> Result<Delivery, NotificationError> {
    let recipient_id = event.recipient_id();
    if matches!(event, DispatchEvent::StatusChanged { .. }) && recipient_id == event.actor().id {
        return Ok(Delivery::Skipped);
    }

    let Some(recipient) = users.get(recipient_id).await? else {
        return Ok(Delivery::Skipped);
    };

    let status_change = match event {
        DispatchEvent::StatusChanged {
            old_status,
            new_status,
            ..
        } => Some((*old_status, *new_status)),
        _ => None,
    };
    let payload = NotificationPayload {
        recipient,
        action: event.action().clone(),
        actor: event.actor().clone(),
        status_change,
    };
    sink.send(event.kind(), &payload).await?;
    Ok(Delivery::Sent)
}

/// Publishing side of the notification channel. Cheap to clone.
#[derive(Clone)]
pub struct NotificationDispatcher {
    /// `None` when notifications are switched off; events are dropped at
    /// publish time and no consumer runs.
    tx: Option<mpsc::UnboundedSender<DispatchEvent>>,
}

impl NotificationDispatcher {
    /// Starts the consumer task. Must be called inside a tokio runtime.
    pub fn spawn(
        users: Arc<dyn UserDirectory>,
        sink: Arc<dyn NotificationSink>,
        enabled: bool,
    ) -> Self {
        if !enabled {
            debug!("Notifications disabled, no consumer started");
            return Self { tx: None };
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<DispatchEvent>();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let kind = event.kind().as_str();
                let action_id = event.action().id;
                let users = users.clone();
                let sink = sink.clone();
                tokio::spawn(async move {
                    match deliver(&event, &*users, &*sink).await {
                        Ok(Delivery::Sent) => debug!(%action_id, kind, "Notification sent"),
                        Ok(Delivery::Skipped) => {
                            debug!(%action_id, kind, "Notification skipped")
                        }
                        Err(e) => warn!(%action_id, kind, error = %e, "Notification failed"),
                    }
                });
            }
            debug!("Notification consumer stopped");
        });

        Self { tx: Some(tx) }
    }

    /// A dispatcher whose events land on the returned receiver instead of
    /// being delivered.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn dispatch_assigned(&self, action: &Action, assignee: ObjectId, actor: &Actor) {
        if let Some(action) = ActionSummary::of(action) {
            self.publish(DispatchEvent::Assigned {
                action,
                assignee,
                actor: actor.into(),
            });
        }
    }

    pub fn dispatch_status_changed(
        &self,
        action: &Action,
        old_status: ActionStatus,
        new_status: ActionStatus,
        owner: ObjectId,
        actor: &Actor,
    ) {
        if let Some(action) = ActionSummary::of(action) {
            self.publish(DispatchEvent::StatusChanged {
                action,
                old_status,
                new_status,
                owner,
                actor: actor.into(),
            });
        }
    }

    pub fn dispatch_reassigned(&self, action: &Action, new_assignee: ObjectId, actor: &Actor) {
        if let Some(action) = ActionSummary::of(action) {
            self.publish(DispatchEvent::Reassigned {
                action,
                new_assignee,
                actor: actor.into(),
            });
        }
    }

    fn publish(&self, event: DispatchEvent) {
        let action_id = event.action().id;
        let kind = event.kind().as_str();
        let Some(tx) = &self.tx else {
            debug!(%action_id, kind, "Notifications disabled, event dropped");
            return;
        };
        if tx.send(event).is_err() {
            warn!(%action_id, kind, "Notification consumer gone, event dropped");
        }
    }
}
