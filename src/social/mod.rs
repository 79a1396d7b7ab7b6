//! Likes, comments and replies for one image.
//!
//! Every mutation is applied to the local working copy first, then written
//! to the document store. When a write fails the working copy is replaced by
//! a fresh read of the public record; nothing is rolled back field by field.
//!
//! Likes and comments live in two places: the public record and, when the
//! image belongs to a collection, the owner's per-collection copy. Both
//! writes are issued independently and there is no transaction, so a partial
//! failure leaves the copies diverged until something rewrites them.
//!
//! The whole comment list is rewritten on every change. Two sessions adding
//! comments at the same time can therefore lose one of them (last write wins).

pub mod permissions;

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::db::models::{
    CollectionId, Comment, CommentId, Item, ItemId, LikeSet, Reply, ReplyId, SocialFields,
    UserId,
};
use crate::error::{AppError, AppResult};
use crate::gateway::{CollectionPath, DocPath, DocumentGateway, GatewayError};
use crate::session::Session;

pub use self::permissions::{can_modify, ensure_can_modify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    /// Whether the caller likes the image after the toggle
    pub liked: bool,
    pub count: usize,
}

fn clean_text(text: &str, what: &str) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", what)));
    }
    Ok(text.to_string())
}

pub struct SocialSync {
    gateway: Arc<dyn DocumentGateway>,
    item_id: ItemId,
    owner: Option<UserId>,
    collection: Option<CollectionId>,
    likes: LikeSet,
    comments: Vec<Comment>,
    replies: Vec<Reply>,
}

impl SocialSync {
    /// Seed the working copy from an item snapshot. The snapshot is only a
    /// hint; call `refresh` for the canonical state.
    pub fn new(gateway: Arc<dyn DocumentGateway>, item: &Item) -> Self {
        Self {
            gateway,
            item_id: item.id.clone(),
            owner: item.user_id.clone(),
            collection: item.collection_id.clone(),
            likes: item.likes.clone(),
            comments: item.comments.clone(),
            replies: Vec::new(),
        }
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    pub fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    pub fn likes(&self) -> &LikeSet {
        &self.likes
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    pub fn replies_for<'a>(&'a self, comment: &'a CommentId) -> impl Iterator<Item = &'a Reply> {
        self.replies.iter().filter(move |r| &r.comment_id == comment)
    }

    /// Comments plus replies.
    pub fn total_comments(&self) -> usize {
        self.comments.len() + self.replies.len()
    }

    pub fn has_liked(&self, session: &Session) -> bool {
        session
            .user_id()
            .map(|u| self.likes.contains(u))
            .unwrap_or(false)
    }

    /// `item` with this working copy's likes and comments.
    pub fn merged_into(&self, item: &Item) -> Item {
        Item {
            likes: self.likes.clone(),
            comments: self.comments.clone(),
            ..item.clone()
        }
    }

    /// Replace the working copy with the public record and its replies.
    pub async fn refresh(&mut self) -> AppResult<()> {
        let doc = self
            .gateway
            .get(&DocPath::public_upload(&self.item_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {}", self.item_id)))?;
        let social: SocialFields = serde_json::from_value(doc).map_err(GatewayError::from)?;

        let snapshots = self
            .gateway
            .list(&CollectionPath::replies(&self.item_id))
            .await?;
        let replies = snapshots
            .iter()
            .filter_map(|s| match s.decode::<Reply>() {
                Ok(reply) => Some(reply),
                Err(e) => {
                    tracing::warn!("Skipping malformed reply {}: {}", s.id, e);
                    None
                }
            })
            .collect();

        self.likes = social.likes;
        self.comments = social.comments;
        self.replies = replies;
        Ok(())
    }

    pub async fn toggle_like(&mut self, session: &Session) -> AppResult<LikeToggle> {
        let user = session.require_user()?.id.clone();
        self.require_upload()?;

        let liked = self.likes.toggle(&user);
        self.persist().await?;

        Ok(LikeToggle {
            liked,
            count: self.likes.len(),
        })
    }

    pub async fn add_comment(&mut self, session: &Session, text: &str) -> AppResult<Comment> {
        let author = session.author_ref()?;
        self.require_upload()?;
        let text = clean_text(text, "Comment")?;

        let comment = Comment {
            id: CommentId::generate(),
            text,
            user: author,
        };
        self.comments.push(comment.clone());
        self.persist().await?;

        Ok(comment)
    }

    pub async fn edit_comment(
        &mut self,
        session: &Session,
        comment_id: &CommentId,
        text: &str,
    ) -> AppResult<()> {
        let caller = session.require_user()?.id.clone();
        let pos = self.comment_position(comment_id)?;
        ensure_can_modify(&caller, &self.comments[pos].user.id, self.owner.as_ref())?;
        let text = clean_text(text, "Comment")?;

        self.comments[pos].text = text;
        self.persist().await
    }

    /// Delete a comment and every reply under it. Replies are deleted one by
    /// one before the comment list is written; a failure part way leaves the
    /// already deleted replies gone while the comment stays listed.
    pub async fn delete_comment(&mut self, session: &Session, comment_id: &CommentId) -> AppResult<()> {
        let caller = session.require_user()?.id.clone();
        let pos = self.comment_position(comment_id)?;
        ensure_can_modify(&caller, &self.comments[pos].user.id, self.owner.as_ref())?;

        let doomed: Vec<ReplyId> = self
            .replies_for(comment_id)
            .map(|r| r.id.clone())
            .collect();
        for reply_id in doomed {
            let path = DocPath::reply(&self.item_id, &reply_id);
            if let Err(e) = self.gateway.delete(&path).await {
                return Err(self.reconcile(e).await);
            }
            self.replies.retain(|r| r.id != reply_id);
        }

        self.comments.retain(|c| &c.id != comment_id);
        self.persist().await
    }

    pub async fn add_reply(
        &mut self,
        session: &Session,
        comment_id: &CommentId,
        text: &str,
    ) -> AppResult<Reply> {
        let author = session.author_ref()?;
        self.require_upload()?;
        let text = clean_text(text, "Reply")?;
        self.comment_position(comment_id)?;

        let reply = Reply {
            id: ReplyId::generate(),
            comment_id: comment_id.clone(),
            text,
            user: author,
        };
        self.replies.push(reply.clone());

        let data = serde_json::to_value(&reply).map_err(GatewayError::from)?;
        let path = DocPath::reply(&self.item_id, &reply.id);
        if let Err(e) = self.gateway.set(&path, data).await {
            return Err(self.reconcile(e).await);
        }

        Ok(reply)
    }

    pub async fn edit_reply(
        &mut self,
        session: &Session,
        reply_id: &ReplyId,
        text: &str,
    ) -> AppResult<()> {
        let caller = session.require_user()?.id.clone();
        let pos = self.reply_position(reply_id)?;
        ensure_can_modify(&caller, &self.replies[pos].user.id, self.owner.as_ref())?;
        let text = clean_text(text, "Reply")?;

        self.replies[pos].text = text.clone();

        let mut fields = Map::new();
        fields.insert("text".to_string(), Value::String(text));
        let path = DocPath::reply(&self.item_id, reply_id);
        if let Err(e) = self.gateway.update(&path, fields).await {
            return Err(self.reconcile(e).await);
        }
        Ok(())
    }

    pub async fn delete_reply(&mut self, session: &Session, reply_id: &ReplyId) -> AppResult<()> {
        let caller = session.require_user()?.id.clone();
        let pos = self.reply_position(reply_id)?;
        ensure_can_modify(&caller, &self.replies[pos].user.id, self.owner.as_ref())?;

        self.replies.remove(pos);

        let path = DocPath::reply(&self.item_id, reply_id);
        if let Err(e) = self.gateway.delete(&path).await {
            return Err(self.reconcile(e).await);
        }
        Ok(())
    }

    /// Only uploads have a public record to write to; explore photos do not.
    fn require_upload(&self) -> AppResult<()> {
        match self.owner {
            Some(_) => Ok(()),
            None => Err(AppError::Validation(
                "Only uploaded images can be liked or commented on".to_string(),
            )),
        }
    }

    fn comment_position(&self, comment_id: &CommentId) -> AppResult<usize> {
        self.comments
            .iter()
            .position(|c| &c.id == comment_id)
            .ok_or_else(|| AppError::NotFound("Comment".to_string()))
    }

    fn reply_position(&self, reply_id: &ReplyId) -> AppResult<usize> {
        self.replies
            .iter()
            .position(|r| &r.id == reply_id)
            .ok_or_else(|| AppError::NotFound("Reply".to_string()))
    }

    fn social_fields(&self) -> Result<Map<String, Value>, GatewayError> {
        let mut fields = Map::new();
        fields.insert("likes".to_string(), serde_json::to_value(&self.likes)?);
        fields.insert("comments".to_string(), serde_json::to_value(&self.comments)?);
        Ok(fields)
    }

    fn collection_copy_path(&self) -> Option<DocPath> {
        match (&self.owner, &self.collection) {
            (Some(owner), Some(collection)) => Some(DocPath::collection_image(
                owner,
                collection,
                &self.item_id,
            )),
            (None, Some(collection)) => {
                tracing::warn!(
                    "Image {} is in collection {} but has no owner; skipping copy",
                    self.item_id,
                    collection
                );
                None
            }
            _ => None,
        }
    }

    /// Write likes and comments to the public record and the collection copy.
    async fn persist(&mut self) -> AppResult<()> {
        let fields = self.social_fields()?;
        let public_path = DocPath::public_upload(&self.item_id);
        let copy_path = self.collection_copy_path();

        let gateway = &self.gateway;
        let (public, copy) = futures::join!(
            gateway.update(&public_path, fields.clone()),
            async {
                match &copy_path {
                    Some(path) => gateway.update(path, fields.clone()).await,
                    None => Ok(()),
                }
            }
        );

        if let Err(e) = &copy {
            tracing::error!("Collection copy of {} not updated: {}", self.item_id, e);
        }
        if public.is_ok() != copy.is_ok() {
            tracing::warn!("Public and collection copies of {} diverged", self.item_id);
        }

        match public.and(copy) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.reconcile(e).await),
        }
    }

    async fn reconcile(&mut self, cause: GatewayError) -> AppError {
        tracing::error!(
            "Write for {} failed, re-reading canonical state: {}",
            self.item_id,
            cause
        );
        if let Err(e) = self.refresh().await {
            tracing::error!("Re-read of {} failed: {}", self.item_id, e);
        }
        AppError::Gateway(cause)
    }
}
