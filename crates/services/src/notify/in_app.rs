use async_trait::async_trait;
use bson::DateTime;
use mongodb::Database;
use safetrack_db::models::{
    Action, ActionStatus, Notification, NotificationPriority, NotificationSource, NotificationType,
};
use serde_json::json;
use tracing::debug;

use super::{NotificationError, NotificationKind, NotificationPayload, NotificationSink};
use crate::dao::base::BaseDao;

/// Default sink: stores a notification in the recipient's in-app inbox.
pub struct InAppNotifier {
    base: BaseDao<Notification>,
}

impl InAppNotifier {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Notification::COLLECTION),
        }
    }
}

#[async_trait]
impl NotificationSink for InAppNotifier {
    async fn send(
        &self,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<(), NotificationError> {
        if !payload.recipient.notification_preferences.wants_in_app() {
            debug!(kind = kind.as_str(), "Recipient opted out of in-app notifications");
            return Ok(());
        }
        let Some(notification) = build_notification(kind, payload) else {
            return Ok(());
        };
        self.base.insert_one(&notification).await?;
        Ok(())
    }
}

/// `None` when the event has no in-app counterpart (a status change other
/// than completion).
pub fn build_notification(
    kind: NotificationKind,
    payload: &NotificationPayload,
) -> Option<Notification> {
    let action = &payload.action;
    let recipient_id = payload.recipient.id?;

    let (notification_type, title, message, metadata) = match kind {
        NotificationKind::Assigned | NotificationKind::Reassigned => (
            NotificationType::ActionAssigned,
            "New Action Assigned".to_string(),
            format!("You have been assigned to: {}", action.title),
            json!({
                "actionTitle": action.title,
                "dueDate": action.due_date.map(|d| d.to_string()),
                "sourceType": action.source_kind.as_str(),
                "sourceId": action.source_id.to_hex(),
                "createdBy": payload.actor.display_name,
            }),
        ),
        NotificationKind::StatusChanged => {
            let (_, new_status) = payload.status_change?;
            if new_status != ActionStatus::Done {
                return None;
            }
            (
                NotificationType::ActionStatusChanged,
                "Action Completed".to_string(),
                format!("Action \"{}\" has been marked as completed.", action.title),
                json!({
                    "actionTitle": action.title,
                    "completedBy": payload.actor.display_name,
                }),
            )
        }
    };

    Some(Notification {
        id: None,
        tenant_id: action.tenant_id,
        user_id: recipient_id,
        notification_type,
        priority: NotificationPriority::Normal,
        title,
        message,
        source: NotificationSource {
            entity_type: Action::ENTITY_TYPE.to_string(),
            entity_id: action.id,
            actor_id: Some(payload.actor.id),
        },
        metadata,
        is_read: false,
        read_at: None,
        created_at: DateTime::now(),
    })
}
