use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::collections::Collections;
use crate::config::Config;
use crate::feed::{ExploreSource, FeedPaginator, UploadsSource, UserUploadsSource};
use crate::gateway::DocumentGateway;
use crate::images::ImageSource;
use crate::db::models::UserId;
use crate::uploads::UploadService;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Long-lived collaborators shared by every view of one process.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn DocumentGateway>,
    pub images: Arc<dyn ImageSource>,
    pub config: Config,
}

impl AppState {
    /// Explore feed over the external image source, optionally filtered by a search query.
    pub fn explore_feed(&self, query: Option<String>) -> FeedPaginator {
        let source = ExploreSource::new(self.images.clone(), query);
        FeedPaginator::new(Arc::new(source), self.config.feed.page_size)
    }

    /// Feed of public uploads, newest first.
    pub fn uploads_feed(&self) -> FeedPaginator {
        let source = UploadsSource::new(self.gateway.clone());
        FeedPaginator::new(Arc::new(source), self.config.feed.page_size)
    }

    /// Uploads of one user, as shown on their profile.
    pub fn user_feed(&self, user: UserId) -> FeedPaginator {
        let source = UserUploadsSource::new(self.gateway.clone(), user);
        FeedPaginator::new(Arc::new(source), self.config.feed.page_size)
    }

    pub fn uploads(&self) -> UploadService {
        UploadService::new(self.gateway.clone(), self.config.uploads.max_file_bytes)
    }

    pub fn collections(&self) -> Collections {
        Collections::new(self.gateway.clone())
    }
}
