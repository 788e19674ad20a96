use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{
    Action, AuditLog, Incident, Inspection, InspectionResponse, Notification, User,
};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(
        db,
        User::COLLECTION,
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index(bson::doc! { "tenant_id": 1, "role": 1 }),
        ],
    )
    .await?;

    // Incidents / inspections are owned elsewhere; we only look them up by id and site
    create_indexes(
        db,
        Incident::COLLECTION,
        vec![index(bson::doc! { "tenant_id": 1, "site_id": 1 })],
    )
    .await?;

    create_indexes(
        db,
        Inspection::COLLECTION,
        vec![index(bson::doc! { "tenant_id": 1, "site_id": 1 })],
    )
    .await?;

    create_indexes(
        db,
        InspectionResponse::COLLECTION,
        vec![index(bson::doc! { "inspection_id": 1 })],
    )
    .await?;

    // Actions
    create_indexes(
        db,
        Action::COLLECTION,
        vec![
            index(bson::doc! { "tenant_id": 1, "created_at": -1 }),
            index(bson::doc! { "tenant_id": 1, "assigned_to": 1, "created_at": -1 }),
            index(bson::doc! { "tenant_id": 1, "status": 1 }),
            index(bson::doc! { "tenant_id": 1, "due_date": 1 }),
            index(bson::doc! { "source.type": 1, "source.id": 1 }),
        ],
    )
    .await?;

    // Audit Logs
    create_indexes(
        db,
        AuditLog::COLLECTION,
        vec![
            index(bson::doc! { "entity_type": 1, "entity_id": 1, "occurred_at": -1 }),
            index(bson::doc! { "tenant_id": 1, "occurred_at": -1 }),
            index(bson::doc! { "tenant_id": 1, "user_id": 1, "occurred_at": -1 }),
        ],
    )
    .await?;

    // Notifications
    create_indexes(
        db,
        Notification::COLLECTION,
        vec![
            index(bson::doc! { "user_id": 1, "is_read": 1, "created_at": -1 }),
            index(bson::doc! { "tenant_id": 1, "user_id": 1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
