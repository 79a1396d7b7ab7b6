use std::sync::Arc;

use crate::db::models::{Comment, CommentId, Item, Reply, ReplyId};
use crate::error::AppResult;
use crate::gateway::DocumentGateway;
use crate::profiles::{self, Uploader};
use crate::session::Session;
use crate::social::{LikeToggle, SocialSync};

/// Receives the item with its latest likes and comments after each change,
/// so the feed that opened the viewer can replace its cached copy.
pub type UpdateCallback = Box<dyn FnMut(Item) + Send>;

/// One open image: its canonical social state, its uploader, and the
/// actions the acting session may take on it.
pub struct DetailViewer {
    item: Item,
    session: Session,
    sync: SocialSync,
    uploader: Option<Uploader>,
    on_update: UpdateCallback,
}

impl DetailViewer {
    /// Open `item`. Its likes and comments are only a hint; the canonical
    /// record and the uploader profile are read before this returns. Read
    /// failures are logged and the hint is kept.
    pub async fn open(
        item: Item,
        session: Session,
        gateway: Arc<dyn DocumentGateway>,
        on_update: UpdateCallback,
    ) -> Self {
        let mut sync = SocialSync::new(gateway.clone(), &item);
        if let Err(e) = sync.refresh().await {
            tracing::error!("Could not load social state for {}: {}", item.id, e);
        }

        let uploader = match &item.user_id {
            Some(user) => match profiles::get_profile(&gateway, user).await {
                Ok(Some(profile)) => Some(Uploader::from_profile(user.clone(), &profile)),
                Ok(None) => None,
                Err(e) => {
                    tracing::error!("Could not load uploader {}: {}", user, e);
                    None
                }
            },
            None => None,
        };

        Self {
            item,
            session,
            sync,
            uploader,
            on_update,
        }
    }

    /// The item as currently known, including its social state.
    pub fn item(&self) -> Item {
        self.sync.merged_into(&self.item)
    }

    pub fn uploader(&self) -> Option<&Uploader> {
        self.uploader.as_ref()
    }

    pub fn sync(&self) -> &SocialSync {
        &self.sync
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn comments(&self) -> &[Comment] {
        self.sync.comments()
    }

    pub fn total_comments(&self) -> usize {
        self.sync.total_comments()
    }

    pub fn has_liked(&self) -> bool {
        self.sync.has_liked(&self.session)
    }

    /// Link to the full-resolution image.
    pub fn share_link(&self) -> &str {
        &self.item.full_src
    }

    pub async fn like(&mut self) -> AppResult<LikeToggle> {
        let toggle = self.sync.toggle_like(&self.session).await?;
        self.push_update();
        Ok(toggle)
    }

    pub async fn comment(&mut self, text: &str) -> AppResult<Comment> {
        let comment = self.sync.add_comment(&self.session, text).await?;
        self.push_update();
        Ok(comment)
    }

    pub async fn edit_comment(&mut self, comment: &CommentId, text: &str) -> AppResult<()> {
        self.sync.edit_comment(&self.session, comment, text).await?;
        self.push_update();
        Ok(())
    }

    pub async fn delete_comment(&mut self, comment: &CommentId) -> AppResult<()> {
        self.sync.delete_comment(&self.session, comment).await?;
        self.push_update();
        Ok(())
    }

    // Replies live outside the item record, so these never notify.
    pub async fn reply(&mut self, comment: &CommentId, text: &str) -> AppResult<Reply> {
        self.sync.add_reply(&self.session, comment, text).await
    }

    pub async fn edit_reply(&mut self, reply: &ReplyId, text: &str) -> AppResult<()> {
        self.sync.edit_reply(&self.session, reply, text).await
    }

    pub async fn delete_reply(&mut self, reply: &ReplyId) -> AppResult<()> {
        self.sync.delete_reply(&self.session, reply).await
    }

    /// Close the viewer. Nothing can be written through it afterwards.
    pub fn close(self) -> Item {
        tracing::debug!("Closed viewer for {}", self.item.id);
        self.sync.merged_into(&self.item)
    }

    fn push_update(&mut self) {
        let merged = self.sync.merged_into(&self.item);
        (self.on_update)(merged);
    }
}
