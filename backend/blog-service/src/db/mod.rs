//! Storage backends for posts and comments
//!
//! Two interchangeable implementations share one contract:
//! - [`MemoryStore`]: process-local maps behind a read/write lock
//! - [`PgStore`]: PostgreSQL, every unit of work retried on transient conflicts

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::error::Result;
use crate::models::{Comment, NewComment, NewPost, Post};
use crate::pagination::{Page, PageRequest};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Inserts a post under a freshly generated id and returns the id.
    async fn create_post(&self, post: NewPost) -> Result<String>;

    /// Returns `StoreError::PostNotFound` when absent.
    async fn get_post(&self, id: &str) -> Result<Post>;

    /// All posts ordered by `created_at`, then `id`.
    async fn list_posts(&self) -> Result<Vec<Post>>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Inserts a comment under a freshly generated id and returns the id.
    ///
    /// Neither the post nor the parent is validated here.
    async fn create_comment(&self, comment: NewComment) -> Result<String>;

    /// Succeeds when `comment_id` exists under `post_id`.
    ///
    /// Fails with `CommentNotFound` when the comment is absent and with
    /// `OwnershipMismatch` when it belongs to another post.
    async fn check_comment_ownership(&self, comment_id: &str, post_id: &str) -> Result<()>;

    /// One page of the comments of `post_id` in `(created_at, id)` order.
    async fn list_comments(&self, post_id: &str, request: &PageRequest) -> Result<Page<Comment>>;
}

/// A complete backend.
pub trait BlogStore: PostStore + CommentStore {}

impl<T: PostStore + CommentStore> BlogStore for T {}

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    InMemory,
    Postgres,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-memory" | "inmemory" | "memory" => Ok(StorageKind::InMemory),
            "postgres" | "postgresql" => Ok(StorageKind::Postgres),
            other => Err(format!(
                "unknown storage type '{other}', expected 'in-memory' or 'postgres'"
            )),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::InMemory => write!(f, "in-memory"),
            StorageKind::Postgres => write!(f, "postgres"),
        }
    }
}
