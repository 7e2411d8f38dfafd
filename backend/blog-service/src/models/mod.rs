/// Entity model for posts and threaded comments
///
/// Both entities are insert-only: they are created once and read afterwards.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Enforced by the service layer, not by the stores
    pub comments_allowed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    /// When set, must name a comment under the same post
    pub parent_id: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a post; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub comments_allowed: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a comment; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: String,
    pub parent_id: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl NewPost {
    pub(crate) fn into_post(self, id: String) -> Post {
        Post {
            id,
            title: self.title,
            content: self.content,
            comments_allowed: self.comments_allowed,
            created_at: self.created_at,
        }
    }
}

impl NewComment {
    pub(crate) fn into_comment(self, id: String) -> Comment {
        Comment {
            id,
            post_id: self.post_id,
            parent_id: self.parent_id,
            text: self.text,
            created_at: self.created_at,
        }
    }
}
