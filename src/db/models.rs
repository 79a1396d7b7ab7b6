// Stored document shapes and the in-memory item they project into
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identity of a signed-in user.
    UserId
);
string_id!(
    /// Identity of an image, unique within a feed.
    ItemId
);
string_id!(CollectionId);
string_id!(CommentId);
string_id!(ReplyId);

impl CommentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl ReplyId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Author snapshot taken when a comment or reply is written. Not re-joined
/// against the profile, so renames do not propagate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    pub user: AuthorRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: ReplyId,
    pub comment_id: CommentId,
    pub text: String,
    pub user: AuthorRef,
}

/// Users who liked an item. Stored as a list; each user appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<UserId>", into = "Vec<UserId>")]
pub struct LikeSet(Vec<UserId>);

impl From<Vec<UserId>> for LikeSet {
    fn from(users: Vec<UserId>) -> Self {
        users.into_iter().collect()
    }
}

impl From<LikeSet> for Vec<UserId> {
    fn from(set: LikeSet) -> Self {
        set.0
    }
}

impl LikeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.0.contains(user)
    }

    /// Flip membership of `user`. Returns true when the user now likes the item.
    pub fn toggle(&mut self, user: &UserId) -> bool {
        if self.contains(user) {
            self.0.retain(|u| u != user);
            false
        } else {
            self.0.push(user.clone());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }
}

impl FromIterator<UserId> for LikeSet {
    fn from_iter<T: IntoIterator<Item = UserId>>(iter: T) -> Self {
        let mut set = LikeSet::new();
        for user in iter {
            if !set.contains(&user) {
                set.0.push(user);
            }
        }
        set
    }
}

/// An image with its social metadata, as held by feeds and the detail viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub src: String,
    pub full_src: String,
    pub alt: String,
    pub user_id: Option<UserId>,
    pub collection_id: Option<CollectionId>,
    pub likes: LikeSet,
    pub comments: Vec<Comment>,
}

impl Item {
    pub fn new(id: impl Into<String>, src: impl Into<String>, full_src: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(id),
            src: src.into(),
            full_src: full_src.into(),
            alt: "Image".to_string(),
            user_id: None,
            collection_id: None,
            likes: LikeSet::new(),
            comments: Vec::new(),
        }
    }
}

/// `publicUploads/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicUpload {
    pub image_base64: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub created_at: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    pub likes: LikeSet,
    pub comments: Vec<Comment>,
}

impl Default for PublicUpload {
    fn default() -> Self {
        Self {
            image_base64: String::new(),
            title: "Untitled".to_string(),
            description: String::new(),
            link: String::new(),
            created_at: String::new(),
            user_id: String::new(),
            collection_id: None,
            likes: LikeSet::new(),
            comments: Vec::new(),
        }
    }
}

impl PublicUpload {
    pub fn into_item(self, id: impl Into<String>) -> Item {
        Item {
            id: ItemId::new(id),
            src: self.image_base64.clone(),
            full_src: self.image_base64,
            alt: self.title,
            user_id: non_empty(self.user_id).map(UserId),
            collection_id: self.collection_id.and_then(non_empty).map(CollectionId),
            likes: self.likes,
            comments: self.comments,
        }
    }
}

/// The social half of a stored item. Both the public record and the
/// per-collection copy carry these two fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialFields {
    pub likes: LikeSet,
    pub comments: Vec<Comment>,
}

/// `users/{uid}/collections/{cid}/images/{itemId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionImage {
    pub url: String,
    pub full_url: String,
    pub alt: String,
    pub owner_id: Option<String>,
    pub saved_at: String,
    pub likes: LikeSet,
    pub comments: Vec<Comment>,
}

impl Default for CollectionImage {
    fn default() -> Self {
        Self {
            url: String::new(),
            full_url: String::new(),
            alt: "Image".to_string(),
            owner_id: None,
            saved_at: String::new(),
            likes: LikeSet::new(),
            comments: Vec::new(),
        }
    }
}

/// `users/{uid}/collections/{cid}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionRecord {
    pub name: String,
    pub created_at: String,
}

/// `users/{uid}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
