use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub tenant_id: ObjectId,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub notification_preferences: NotificationPrefs,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub deleted_at: Option<DateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Worker,
    Manager,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPrefs {
    #[serde(default = "bool_true")]
    pub in_app: bool,
    #[serde(default = "bool_true")]
    pub email_action_assigned: bool,
    #[serde(default)]
    pub mute_all: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            in_app: true,
            email_action_assigned: true,
            mute_all: false,
        }
    }
}

impl NotificationPrefs {
    pub fn wants_in_app(&self) -> bool {
        self.in_app && !self.mute_all
    }

    pub fn wants_assignment_email(&self) -> bool {
        self.email_action_assigned && !self.mute_all
    }
}

fn bool_true() -> bool {
    true
}

impl User {
    pub const COLLECTION: &'static str = "users";
}
