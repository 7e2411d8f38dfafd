/// Blog service - orchestrates the store, resource locks and comment fanout
use chrono::{DateTime, SubsecRound, Utc};
use futures_util::stream::Stream;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::BlogStore;
use crate::error::{Result, StoreError};
use crate::locks::ResourceLocks;
use crate::models::{Comment, NewComment, NewPost, Post};
use crate::notifications::CommentNotifier;
use crate::pagination::{Page, PageRequest};

pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct BlogService {
    store: Arc<dyn BlogStore>,
    locks: Arc<ResourceLocks>,
    notifier: CommentNotifier,
    max_page_size: usize,
}

/// Timestamps are kept at microsecond precision, the finest PostgreSQL stores.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

impl BlogService {
    pub fn new(store: Arc<dyn BlogStore>, notifier: CommentNotifier) -> Self {
        Self {
            store,
            locks: Arc::new(ResourceLocks::new()),
            notifier,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn locks(&self) -> &ResourceLocks {
        &self.locks
    }

    pub async fn create_post(
        &self,
        title: String,
        content: String,
        comments_allowed: bool,
    ) -> Result<Post> {
        let new_post = NewPost {
            title,
            content,
            comments_allowed,
            created_at: now(),
        };
        let id = self.store.create_post(new_post.clone()).await?;
        info!(post_id = %id, "Post created");
        Ok(new_post.into_post(id))
    }

    pub async fn post(&self, id: &str) -> Result<Post> {
        self.store.get_post(id).await
    }

    pub async fn posts(&self) -> Result<Vec<Post>> {
        self.store.list_posts().await
    }

    /// Creates a comment on `post_id`, optionally replying to `parent_id`.
    ///
    /// Comment creation is serialized per post. The created comment is
    /// published to subscribers of the post once it is stored.
    pub async fn create_comment(
        &self,
        post_id: &str,
        parent_id: Option<String>,
        text: String,
    ) -> Result<Comment> {
        let post = self.store.get_post(post_id).await?;
        if !post.comments_allowed {
            return Err(StoreError::CommentsDisabled(post.id));
        }

        let _guard = self.locks.acquire(post_id).await;

        if let Some(parent_id) = parent_id.as_deref() {
            self.store.check_comment_ownership(parent_id, post_id).await?;
        }

        let new_comment = NewComment {
            post_id: post_id.to_string(),
            parent_id,
            text,
            created_at: now(),
        };
        let id = self.store.create_comment(new_comment.clone()).await?;
        let comment = new_comment.into_comment(id);

        let receivers = self.notifier.publish(&comment);
        debug!(
            post_id,
            comment_id = %comment.id,
            receivers,
            "Comment created"
        );
        Ok(comment)
    }

    /// One page of a post's comments.
    pub async fn comments(&self, post_id: &str, request: &PageRequest) -> Result<Page<Comment>> {
        let page_size = request.page_size()?;
        if page_size > self.max_page_size {
            return Err(StoreError::InvalidArgument(format!(
                "first must not exceed {}, got {page_size}",
                self.max_page_size
            )));
        }
        self.store.list_comments(post_id, request).await
    }

    /// Comments created on `post_id` after this call.
    pub fn subscribe_comments(
        &self,
        post_id: &str,
    ) -> impl Stream<Item = Comment> + Send + 'static {
        debug!(post_id, "Comment subscription opened");
        self.notifier.subscribe(post_id)
    }
}
