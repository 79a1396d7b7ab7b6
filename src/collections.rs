// Per-user collections and the image copies saved into them
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::db::models::{
    CollectionId, CollectionImage, CollectionRecord, Item, ItemId, UserId,
};
use crate::error::{AppError, AppResult};
use crate::gateway::{CollectionPath, DocPath, DocumentGateway, GatewayError};
use crate::session::Session;
use crate::uploads::timestamp_now;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSummary {
    pub id: CollectionId,
    pub name: String,
    pub created_at: String,
    pub images: Vec<(ItemId, CollectionImage)>,
}

impl CollectionSummary {
    /// Preview shown for the collection: its first saved image.
    pub fn preview(&self) -> Option<&str> {
        self.images
            .first()
            .map(|(_, image)| image.url.as_str())
            .filter(|url| !url.is_empty())
    }
}

pub struct Collections {
    gateway: Arc<dyn DocumentGateway>,
}

impl Collections {
    pub fn new(gateway: Arc<dyn DocumentGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(&self, session: &Session, name: &str) -> AppResult<CollectionId> {
        let user = session.require_user()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Collection name cannot be empty".into()));
        }

        let record = CollectionRecord {
            name: name.to_string(),
            created_at: timestamp_now(),
        };
        let data = serde_json::to_value(&record).map_err(GatewayError::from)?;
        let path = self
            .gateway
            .create(&CollectionPath::user_collections(&user.id), data)
            .await?;

        tracing::info!("{} created collection {}", user.id, path);
        Ok(CollectionId::new(path.id()))
    }

    /// Copy `item` into one of the caller's collections. Saving one of the
    /// caller's own uploads also points the public record at the collection,
    /// so later likes and comments are mirrored into the copy.
    pub async fn save_item(
        &self,
        session: &Session,
        collection: &CollectionId,
        item: &Item,
    ) -> AppResult<()> {
        let user = session.require_user()?;
        self.require_collection(session, collection).await?;

        let image = CollectionImage {
            url: item.src.clone(),
            full_url: item.full_src.clone(),
            alt: item.alt.clone(),
            owner_id: item.user_id.as_ref().map(|u| u.to_string()),
            saved_at: timestamp_now(),
            likes: item.likes.clone(),
            comments: item.comments.clone(),
        };
        let data = serde_json::to_value(&image).map_err(GatewayError::from)?;
        self.gateway
            .set(&DocPath::collection_image(&user.id, collection, &item.id), data)
            .await?;

        if item.user_id.as_ref() == Some(&user.id) {
            if let Some(previous) = item.collection_id.as_ref().filter(|c| *c != collection) {
                tracing::warn!(
                    "{} moves from collection {} to {}; the old copy stops syncing",
                    item.id,
                    previous,
                    collection
                );
            }
            let mut fields = Map::new();
            fields.insert(
                "collectionId".to_string(),
                Value::String(collection.to_string()),
            );
            self.gateway
                .update(&DocPath::public_upload(&item.id), fields)
                .await?;
        }

        tracing::debug!("Saved {} into {}/{}", item.id, user.id, collection);
        Ok(())
    }

    /// The caller's collections with the images saved in each.
    pub async fn list(&self, session: &Session) -> AppResult<Vec<CollectionSummary>> {
        let user = session.require_user()?;
        let records = self
            .gateway
            .list(&CollectionPath::user_collections(&user.id))
            .await?;

        let mut summaries = Vec::with_capacity(records.len());
        for snapshot in records {
            let record: CollectionRecord = snapshot.decode()?;
            let id = CollectionId::new(snapshot.id);
            let images = self
                .gateway
                .list(&CollectionPath::collection_images(&user.id, &id))
                .await?
                .into_iter()
                .filter_map(|s| match s.decode::<CollectionImage>() {
                    Ok(image) => Some((ItemId::new(s.id), image)),
                    Err(e) => {
                        tracing::warn!("Skipping malformed collection image {}: {}", s.id, e);
                        None
                    }
                })
                .collect();

            summaries.push(CollectionSummary {
                id,
                name: record.name,
                created_at: record.created_at,
                images,
            });
        }
        Ok(summaries)
    }

    pub async fn remove_image(
        &self,
        session: &Session,
        collection: &CollectionId,
        item: &ItemId,
    ) -> AppResult<()> {
        let user = session.require_user()?;
        self.gateway
            .delete(&DocPath::collection_image(&user.id, collection, item))
            .await?;
        self.unlink_public_record(&user.id, collection, item).await
    }

    /// Delete a collection and every image copy in it.
    pub async fn delete(&self, session: &Session, collection: &CollectionId) -> AppResult<()> {
        let user = session.require_user()?;
        let images_path = CollectionPath::collection_images(&user.id, collection);
        for snapshot in self.gateway.list(&images_path).await? {
            self.gateway.delete(&images_path.doc(snapshot.id.as_str())).await?;
            self.unlink_public_record(&user.id, collection, &ItemId::new(snapshot.id))
                .await?;
        }
        self.gateway
            .delete(&DocPath::user_collection(&user.id, collection))
            .await?;

        tracing::info!("{} deleted collection {}", user.id, collection);
        Ok(())
    }

    /// Clear `collectionId` on the caller's own public record when it still
    /// points at `collection`, so social writes stop targeting a removed copy.
    async fn unlink_public_record(
        &self,
        user: &UserId,
        collection: &CollectionId,
        item: &ItemId,
    ) -> AppResult<()> {
        let path = DocPath::public_upload(item);
        let Some(doc) = self.gateway.get(&path).await? else {
            return Ok(());
        };
        let owned = doc.get("userId").and_then(Value::as_str) == Some(user.as_str());
        let linked = doc.get("collectionId").and_then(Value::as_str) == Some(collection.as_str());
        if owned && linked {
            let mut fields = Map::new();
            fields.insert("collectionId".to_string(), Value::Null);
            self.gateway.update(&path, fields).await?;
            tracing::debug!("Unlinked {} from collection {}", item, collection);
        }
        Ok(())
    }

    async fn require_collection(&self, session: &Session, collection: &CollectionId) -> AppResult<()> {
        let user = session.require_user()?;
        match self
            .gateway
            .get(&DocPath::user_collection(&user.id, collection))
            .await?
        {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("Collection {}", collection))),
        }
    }
}
