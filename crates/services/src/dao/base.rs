use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use mongodb::{ClientSession, Collection, Database};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
    #[error("Entity not found")]
    NotFound,
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation: {0}")]
    Validation(String),
    #[error("Invalid source: {0}")]
    InvalidSource(String),
    #[error("Unexpected inserted id: {0}")]
    UnexpectedId(String),
}

pub type DaoResult<T> = Result<T, DaoError>;

pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Unpin + Send + Sync,
{
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<T>(collection_name),
        }
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<T> {
        self.collection
            .find_one(doc! { "_id": id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_by_id_in_tenant(&self, tenant_id: ObjectId, id: ObjectId) -> DaoResult<T> {
        self.collection
            .find_one(doc! { "_id": id, "tenant_id": tenant_id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_one(&self, filter: Document) -> DaoResult<Option<T>> {
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn find_many(&self, filter: Document, sort: Option<Document>) -> DaoResult<Vec<T>> {
        let mut cursor = if let Some(sort) = sort {
            self.collection.find(filter).sort(sort).await?
        } else {
            self.collection.find(filter).await?
        };

        let mut results = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            results.push(doc);
        }
        Ok(results)
    }

    pub async fn exists(&self, filter: Document) -> DaoResult<bool> {
        Ok(self.collection.find_one(filter).await?.is_some())
    }

    pub async fn insert_one(&self, doc: &T) -> DaoResult<ObjectId> {
        let result = self
            .collection
            .insert_one(doc)
            .await
            .map_err(map_write_error)?;
        inserted_object_id(result.inserted_id)
    }

    /// Insert as part of the transaction carried by `session`.
    pub async fn insert_one_in(&self, doc: &T, session: &mut ClientSession) -> DaoResult<ObjectId> {
        let result = self
            .collection
            .insert_one(doc)
            .session(&mut *session)
            .await
            .map_err(map_write_error)?;
        inserted_object_id(result.inserted_id)
    }

    /// `$set`-style update inside the transaction carried by `session`.
    /// `updated_at` is always stamped alongside the caller's fields.
    pub async fn update_by_id_in(
        &self,
        id: ObjectId,
        update: Document,
        session: &mut ClientSession,
    ) -> DaoResult<bool> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, with_updated_at(update))
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(result.modified_count > 0)
    }
}

fn with_updated_at(mut update: Document) -> Document {
    let now = bson::DateTime::now();
    if !update.contains_key("$set") {
        update.insert("$set", doc! { "updated_at": now });
    } else if let Ok(set_doc) = update.get_document_mut("$set") {
        if !set_doc.contains_key("updated_at") {
            set_doc.insert("updated_at", now);
        }
    }
    update
}

fn map_write_error(e: mongodb::error::Error) -> DaoError {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(
        ref write_error,
    )) = *e.kind
    {
        if write_error.code == 11000 {
            return DaoError::DuplicateKey(write_error.message.clone());
        }
    }
    DaoError::Mongo(e)
}

fn inserted_object_id(inserted: bson::Bson) -> DaoResult<ObjectId> {
    let id = inserted
        .as_object_id()
        .ok_or_else(|| DaoError::UnexpectedId(inserted.to_string()))?;
    debug!(?id, "Inserted document");
    Ok(id)
}
