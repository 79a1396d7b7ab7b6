use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::domain::{Cursor, Page};
use super::paginator::PageSource;
use crate::db::models::{Item, PublicUpload, UserId};
use crate::error::AppResult;
use crate::gateway::{CollectionPath, DocumentGateway, OrderedQuery, Snapshot, StartAfter};
use crate::images::ImageSource;

/// Field public uploads are ordered by, newest first.
pub const UPLOAD_ORDER_FIELD: &str = "createdAt";

fn upload_item(snapshot: &Snapshot) -> Option<Item> {
    match snapshot.decode::<PublicUpload>() {
        Ok(upload) => Some(upload.into_item(snapshot.id.clone())),
        Err(e) => {
            tracing::warn!("Skipping malformed upload {}: {}", snapshot.id, e);
            None
        }
    }
}

/// Explore feed: the external image source, listed or searched by page number.
pub struct ExploreSource {
    images: Arc<dyn ImageSource>,
    query: Option<String>,
}

impl ExploreSource {
    pub fn new(images: Arc<dyn ImageSource>, query: Option<String>) -> Self {
        let query = query.filter(|q| !q.trim().is_empty());
        Self { images, query }
    }
}

#[async_trait]
impl PageSource for ExploreSource {
    async fn fetch_page(&self, cursor: &Cursor, page_size: usize) -> AppResult<Page> {
        let page = cursor.page_number();
        let photos = match &self.query {
            Some(q) => self.images.search_photos(q, page, page_size).await?,
            None => self.images.list_photos(page, page_size).await?,
        };

        Ok(Page {
            items: photos.into_iter().map(|p| p.into_item()).collect(),
            next_cursor: Cursor::Page(page + 1),
        })
    }
}

/// Public uploads, newest first, paged by the last seen `createdAt`.
pub struct UploadsSource {
    gateway: Arc<dyn DocumentGateway>,
}

impl UploadsSource {
    pub fn new(gateway: Arc<dyn DocumentGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl PageSource for UploadsSource {
    async fn fetch_page(&self, cursor: &Cursor, page_size: usize) -> AppResult<Page> {
        let start_after = match cursor {
            Cursor::After { key, id } => Some(StartAfter {
                key: Value::String(key.clone()),
                id: id.clone(),
            }),
            _ => None,
        };
        let query =
            OrderedQuery::newest_first(UPLOAD_ORDER_FIELD, page_size).start_after(start_after);

        let snapshots = self
            .gateway
            .query_ordered(&CollectionPath::public_uploads(), &query)
            .await?;

        let next_cursor = snapshots
            .last()
            .and_then(|s| {
                s.field_str(UPLOAD_ORDER_FIELD).map(|key| Cursor::After {
                    key: key.to_string(),
                    id: s.id.clone(),
                })
            })
            .unwrap_or_else(|| cursor.clone());

        Ok(Page {
            items: snapshots.iter().filter_map(upload_item).collect(),
            next_cursor,
        })
    }
}

/// Uploads of one user. The store only offers an equality query here, so
/// pages are cut client-side from the full, newest-first result.
pub struct UserUploadsSource {
    gateway: Arc<dyn DocumentGateway>,
    user: UserId,
}

impl UserUploadsSource {
    pub fn new(gateway: Arc<dyn DocumentGateway>, user: UserId) -> Self {
        Self { gateway, user }
    }
}

#[async_trait]
impl PageSource for UserUploadsSource {
    async fn fetch_page(&self, cursor: &Cursor, page_size: usize) -> AppResult<Page> {
        let mut snapshots = self
            .gateway
            .query_eq(
                &CollectionPath::public_uploads(),
                "userId",
                &Value::String(self.user.to_string()),
            )
            .await?;

        snapshots.sort_by(|a, b| {
            b.field_str(UPLOAD_ORDER_FIELD)
                .cmp(&a.field_str(UPLOAD_ORDER_FIELD))
        });

        let page = cursor.page_number();
        let skip = (page as usize).saturating_sub(1) * page_size;
        let items = snapshots
            .iter()
            .skip(skip)
            .take(page_size)
            .filter_map(upload_item)
            .collect();

        Ok(Page {
            items,
            next_cursor: Cursor::Page(page + 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::gateway::SqliteGateway;
    use crate::images::{Download, ExternalPhoto, ImageSourceError};
    use serde_json::json;
    use std::sync::Mutex;

    fn gateway() -> Arc<dyn DocumentGateway> {
        let pool = db::memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        Arc::new(SqliteGateway::new(pool))
    }

    async fn seed_upload(gw: &Arc<dyn DocumentGateway>, id: &str, user: &str, ts: &str) {
        gw.set(
            &CollectionPath::public_uploads().doc(id),
            json!({"imageBase64": "data:x", "title": id, "userId": user, "createdAt": ts}),
        )
        .await
        .unwrap();
    }

    #[derive(Default)]
    struct RecordingImages {
        requests: Mutex<Vec<(Option<String>, u32, usize)>>,
    }

    #[async_trait]
    impl ImageSource for RecordingImages {
        async fn list_photos(
            &self,
            page: u32,
            per_page: usize,
        ) -> Result<Vec<ExternalPhoto>, ImageSourceError> {
            self.requests.lock().unwrap().push((None, page, per_page));
            Ok(vec![ExternalPhoto {
                id: format!("p{}", page),
                preview_url: "s".into(),
                full_url: "f".into(),
                alt: None,
            }])
        }

        async fn search_photos(
            &self,
            query: &str,
            page: u32,
            per_page: usize,
        ) -> Result<Vec<ExternalPhoto>, ImageSourceError> {
            self.requests
                .lock()
                .unwrap()
                .push((Some(query.to_string()), page, per_page));
            Ok(vec![])
        }

        async fn download(&self, _url: &str) -> Result<Download, ImageSourceError> {
            Err(ImageSourceError::Status(404))
        }
    }

    #[tokio::test]
    async fn explore_source_walks_page_numbers() {
        let images = Arc::new(RecordingImages::default());
        let source = ExploreSource::new(images.clone(), None);

        let first = source.fetch_page(&Cursor::Start, 10).await.unwrap();
        assert_eq!(first.next_cursor, Cursor::Page(2));
        assert_eq!(first.items[0].id.as_str(), "p1");

        source.fetch_page(&first.next_cursor, 10).await.unwrap();
        assert_eq!(
            *images.requests.lock().unwrap(),
            vec![(None, 1, 10), (None, 2, 10)]
        );
    }

    #[tokio::test]
    async fn explore_source_searches_when_query_given() {
        let images = Arc::new(RecordingImages::default());
        let source = ExploreSource::new(images.clone(), Some("forest".into()));
        source.fetch_page(&Cursor::Start, 5).await.unwrap();
        assert_eq!(
            *images.requests.lock().unwrap(),
            vec![(Some("forest".to_string()), 1, 5)]
        );

        // A blank query means plain listing
        let blank = ExploreSource::new(images.clone(), Some("  ".into()));
        blank.fetch_page(&Cursor::Start, 5).await.unwrap();
        assert_eq!(images.requests.lock().unwrap()[1].0, None);
    }

    #[tokio::test]
    async fn uploads_source_pages_newest_first() {
        let gw = gateway();
        seed_upload(&gw, "old", "u1", "2024-01-01T00:00:00.000Z").await;
        seed_upload(&gw, "mid", "u1", "2024-02-01T00:00:00.000Z").await;
        seed_upload(&gw, "new", "u2", "2024-03-01T00:00:00.000Z").await;
        let source = UploadsSource::new(gw);

        let first = source.fetch_page(&Cursor::Start, 2).await.unwrap();
        let ids: Vec<_> = first.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
        assert_eq!(
            first.next_cursor,
            Cursor::After {
                key: "2024-02-01T00:00:00.000Z".into(),
                id: "mid".into()
            }
        );

        let second = source.fetch_page(&first.next_cursor, 2).await.unwrap();
        let ids: Vec<_> = second.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["old"]);

        let third = source.fetch_page(&second.next_cursor, 2).await.unwrap();
        assert!(third.items.is_empty());
        assert_eq!(third.next_cursor, second.next_cursor);
    }

    #[tokio::test]
    async fn user_uploads_source_filters_by_owner() {
        let gw = gateway();
        seed_upload(&gw, "a", "u1", "2024-01-01T00:00:00.000Z").await;
        seed_upload(&gw, "b", "u2", "2024-01-02T00:00:00.000Z").await;
        seed_upload(&gw, "c", "u1", "2024-01-03T00:00:00.000Z").await;
        let source = UserUploadsSource::new(gw, UserId::new("u1"));

        let first = source.fetch_page(&Cursor::Start, 1).await.unwrap();
        assert_eq!(first.items[0].id.as_str(), "c");
        let second = source.fetch_page(&first.next_cursor, 1).await.unwrap();
        assert_eq!(second.items[0].id.as_str(), "a");
        let third = source.fetch_page(&second.next_cursor, 1).await.unwrap();
        assert!(third.items.is_empty());
    }
}
