use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use safetrack_db::models::{NotificationPrefs, User, UserRole};

use super::base::{BaseDao, DaoResult};

/// Read access to user records, as needed by background consumers.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Current record for `id`; `None` when the user is unknown or deleted.
    async fn get(&self, id: ObjectId) -> DaoResult<Option<User>>;
}

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        tenant_id: ObjectId,
        email: String,
        display_name: String,
        role: UserRole,
    ) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            tenant_id,
            email,
            display_name,
            role,
            notification_preferences: NotificationPrefs::default(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let id = self.base.insert_one(&user).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_active(&self, id: ObjectId) -> DaoResult<Option<User>> {
        self.base
            .find_one(doc! { "_id": id, "deleted_at": null })
            .await
    }

    pub async fn find_active_in_tenant(
        &self,
        tenant_id: ObjectId,
        id: ObjectId,
    ) -> DaoResult<Option<User>> {
        self.base
            .find_one(doc! { "_id": id, "tenant_id": tenant_id, "deleted_at": null })
            .await
    }

    /// Includes deleted users so historical names still resolve.
    pub async fn find_by_ids(&self, ids: Vec<ObjectId>) -> DaoResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.base
            .find_many(doc! { "_id": { "$in": ids } }, None)
            .await
    }
}

#[async_trait]
impl UserDirectory for UserDao {
    async fn get(&self, id: ObjectId) -> DaoResult<Option<User>> {
        self.find_active(id).await
    }
}
