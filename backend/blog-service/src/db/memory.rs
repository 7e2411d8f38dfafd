//! In-memory backend
//!
//! A single read/write lock guards both maps so that a listing always sees a
//! consistent snapshot. Readers share the lock; writers are exclusive.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{CommentStore, PostStore};
use crate::error::{Result, StoreError};
use crate::models::{Comment, NewComment, NewPost, Post};
use crate::pagination::{paginate, Page, PageRequest};

#[derive(Debug, Default)]
struct Tables {
    posts: HashMap<String, Post>,
    comments: HashMap<String, Comment>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create_post(&self, post: NewPost) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut tables = self.tables.write().await;
        tables.posts.insert(id.clone(), post.into_post(id.clone()));
        debug!(post_id = %id, "Post created");
        Ok(id)
    }

    async fn get_post(&self, id: &str) -> Result<Post> {
        let tables = self.tables.read().await;
        tables
            .posts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::PostNotFound(id.to_string()))
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables.posts.values().cloned().collect();
        posts.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(posts)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn create_comment(&self, comment: NewComment) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut tables = self.tables.write().await;
        tables
            .comments
            .insert(id.clone(), comment.into_comment(id.clone()));
        debug!(comment_id = %id, "Comment created");
        Ok(id)
    }

    async fn check_comment_ownership(&self, comment_id: &str, post_id: &str) -> Result<()> {
        let tables = self.tables.read().await;
        let comment = tables
            .comments
            .get(comment_id)
            .ok_or_else(|| StoreError::CommentNotFound(comment_id.to_string()))?;

        if comment.post_id != post_id {
            return Err(StoreError::OwnershipMismatch {
                comment_id: comment_id.to_string(),
                post_id: post_id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_comments(&self, post_id: &str, request: &PageRequest) -> Result<Page<Comment>> {
        let page_size = request.page_size()?;
        if page_size == 0 {
            return Ok(Page::empty());
        }

        let tables = self.tables.read().await;
        let filtered: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        drop(tables);

        paginate(filtered, page_size, request.cursor())
    }
}
