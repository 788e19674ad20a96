use std::collections::HashMap;

use bson::{doc, oid::ObjectId};
use mongodb::Database;
use safetrack_db::models::{ActionSource, Incident, Inspection, InspectionResponse, SourceKind};

use super::base::{BaseDao, DaoResult};

/// Source entities (by kind) located at one site.
#[derive(Debug, Clone, Default)]
pub struct SiteSources {
    pub incident_ids: Vec<ObjectId>,
    pub inspection_ids: Vec<ObjectId>,
}

/// `(kind, source id) -> site id` for a batch of actions.
pub type SiteIndex = HashMap<(SourceKind, ObjectId), ObjectId>;

/// Look-ups against the incident and inspection modules. This subsystem never
/// writes these collections.
pub struct SourceDao {
    pub incidents: BaseDao<Incident>,
    pub inspections: BaseDao<Inspection>,
    pub responses: BaseDao<InspectionResponse>,
}

impl SourceDao {
    pub fn new(db: &Database) -> Self {
        Self {
            incidents: BaseDao::new(db, Incident::COLLECTION),
            inspections: BaseDao::new(db, Inspection::COLLECTION),
            responses: BaseDao::new(db, InspectionResponse::COLLECTION),
        }
    }

    pub async fn exists(&self, tenant_id: ObjectId, kind: SourceKind, id: ObjectId) -> DaoResult<bool> {
        let filter = doc! { "_id": id, "tenant_id": tenant_id };
        match kind {
            SourceKind::Incident => self.incidents.exists(filter).await,
            SourceKind::Inspection => self.inspections.exists(filter).await,
        }
    }

    pub async fn response_belongs_to(
        &self,
        response_id: ObjectId,
        inspection_id: ObjectId,
    ) -> DaoResult<bool> {
        self.responses
            .exists(doc! { "_id": response_id, "inspection_id": inspection_id })
            .await
    }

    pub async fn at_site(&self, tenant_id: ObjectId, site_id: ObjectId) -> DaoResult<SiteSources> {
        let filter = doc! { "tenant_id": tenant_id, "site_id": site_id };
        let incident_ids = self
            .incidents
            .find_many(filter.clone(), None)
            .await?
            .into_iter()
            .filter_map(|i| i.id)
            .collect();
        let inspection_ids = self
            .inspections
            .find_many(filter, None)
            .await?
            .into_iter()
            .filter_map(|i| i.id)
            .collect();

        Ok(SiteSources {
            incident_ids,
            inspection_ids,
        })
    }

    pub async fn site_index<'a, I>(&self, sources: I) -> DaoResult<SiteIndex>
    where
        I: IntoIterator<Item = &'a ActionSource>,
    {
        let mut incident_ids = Vec::new();
        let mut inspection_ids = Vec::new();
        for source in sources {
            match source.kind() {
                SourceKind::Incident => incident_ids.push(source.id()),
                SourceKind::Inspection => inspection_ids.push(source.id()),
            }
        }

        let mut index = SiteIndex::new();
        if !incident_ids.is_empty() {
            for incident in self
                .incidents
                .find_many(doc! { "_id": { "$in": incident_ids } }, None)
                .await?
            {
                if let Some(id) = incident.id {
                    index.insert((SourceKind::Incident, id), incident.site_id);
                }
            }
        }
        if !inspection_ids.is_empty() {
            for inspection in self
                .inspections
                .find_many(doc! { "_id": { "$in": inspection_ids } }, None)
                .await?
            {
                if let Some(id) = inspection.id {
                    index.insert((SourceKind::Inspection, id), inspection.site_id);
                }
            }
        }
        Ok(index)
    }
}
