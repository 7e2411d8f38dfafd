//! PostgreSQL backend
//!
//! Every operation runs as one transaction through [`PgStore::run_in_transaction`],
//! which retries the whole unit of work on serialization failures, deadlocks,
//! lock timeouts and similar transient conflicts. Domain outcomes (a missing
//! row, an unknown cursor) are decided after the transaction commits so they
//! are never mistaken for retryable failures.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db_pool::DbConfig;
use futures::future::BoxFuture;
use resilience::{is_transient_message, with_retry, CancelSignal, RetryConfig, Retryable};
use sqlx::{PgConnection, PgPool};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CommentStore, PostStore};
use crate::error::{Result, StoreError};
use crate::models::{Comment, NewComment, NewPost, Post};
use crate::pagination::{Page, PageRequest};

/// SQLSTATE codes that mean "try the same transaction again".
const RETRYABLE_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
    "57014", // query_canceled
];

/// Engine failure as seen by the retry coordinator.
#[derive(Debug)]
pub struct EngineError(pub sqlx::Error);

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError(err)
    }
}

impl Retryable for EngineError {
    fn is_retryable(&self) -> bool {
        match &self.0 {
            sqlx::Error::Database(db) => {
                let by_code = db
                    .code()
                    .is_some_and(|code| RETRYABLE_SQLSTATES.iter().any(|state| *state == code));
                by_code || is_transient_message(db.message())
            }
            sqlx::Error::PoolTimedOut => true,
            other => is_transient_message(&other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    retry: RetryConfig,
    cancel: CancelSignal,
}

impl PgStore {
    pub fn new(pool: PgPool, retry: RetryConfig, cancel: CancelSignal) -> Self {
        Self {
            pool,
            retry,
            cancel,
        }
    }

    /// Creates the pool, applies pending migrations and returns the store.
    pub async fn connect(
        config: &DbConfig,
        retry: RetryConfig,
        cancel: CancelSignal,
    ) -> anyhow::Result<Self> {
        config.log_config();
        let pool = db_pool::create_pool(config)
            .await
            .context("Failed to create database pool")?;
        Self::migrate(&pool).await?;
        Ok(Self::new(pool, retry, cancel))
    }

    pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs `work` inside one transaction, retrying the whole transaction on
    /// transient engine failures.
    ///
    /// `work` is called once per attempt, so it must not consume its
    /// captures; clone owned data into the returned future instead.
    pub async fn run_in_transaction<T, F>(&self, operation: &str, work: F) -> Result<T>
    where
        T: Send,
        F: for<'c> Fn(&'c mut PgConnection) -> BoxFuture<'c, std::result::Result<T, sqlx::Error>>
            + Send
            + Sync,
    {
        let pool = &self.pool;
        let work = &work;

        let value = with_retry(operation, &self.retry, &self.cancel, move || async move {
            let mut tx = pool.begin().await.map_err(EngineError)?;
            let value = work(&mut *tx).await.map_err(EngineError)?;
            tx.commit().await.map_err(EngineError)?;
            Ok::<_, EngineError>(value)
        })
        .await?;

        Ok(value)
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn create_post(&self, post: NewPost) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let row = post.into_post(id.clone());

        self.run_in_transaction("insert_post", move |conn| {
            let row = row.clone();
            Box::pin(async move {
                sqlx::query(
                    r#"
                    INSERT INTO posts (id, title, content, comments_allowed, created_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(&row.id)
                .bind(&row.title)
                .bind(&row.content)
                .bind(row.comments_allowed)
                .bind(row.created_at)
                .execute(&mut *conn)
                .await?;
                Ok::<_, sqlx::Error>(())
            })
        })
        .await?;

        debug!(post_id = %id, "Post created");
        Ok(id)
    }

    async fn get_post(&self, id: &str) -> Result<Post> {
        let post_id = id.to_string();
        let post = self
            .run_in_transaction("select_post", move |conn| {
                let post_id = post_id.clone();
                Box::pin(async move {
                    sqlx::query_as::<_, Post>(
                        r#"
                        SELECT id, title, content, comments_allowed, created_at
                        FROM posts
                        WHERE id = $1
                        "#,
                    )
                    .bind(post_id)
                    .fetch_optional(&mut *conn)
                    .await
                })
            })
            .await?;

        post.ok_or_else(|| StoreError::PostNotFound(id.to_string()))
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        self.run_in_transaction("select_posts", |conn| {
            Box::pin(async move {
                sqlx::query_as::<_, Post>(
                    r#"
                    SELECT id, title, content, comments_allowed, created_at
                    FROM posts
                    ORDER BY created_at ASC, id ASC
                    "#,
                )
                .fetch_all(&mut *conn)
                .await
            })
        })
        .await
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn create_comment(&self, comment: NewComment) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let row = comment.into_comment(id.clone());

        self.run_in_transaction("insert_comment", move |conn| {
            let row = row.clone();
            Box::pin(async move {
                sqlx::query(
                    r#"
                    INSERT INTO comments (id, post_id, parent_id, text, created_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(&row.id)
                .bind(&row.post_id)
                .bind(&row.parent_id)
                .bind(&row.text)
                .bind(row.created_at)
                .execute(&mut *conn)
                .await?;
                Ok::<_, sqlx::Error>(())
            })
        })
        .await?;

        debug!(comment_id = %id, "Comment created");
        Ok(id)
    }

    async fn check_comment_ownership(&self, comment_id: &str, post_id: &str) -> Result<()> {
        let id = comment_id.to_string();
        let owner: Option<String> = self
            .run_in_transaction("select_comment_owner", move |conn| {
                let id = id.clone();
                Box::pin(async move {
                    sqlx::query_scalar::<_, String>("SELECT post_id FROM comments WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut *conn)
                        .await
                })
            })
            .await?;

        match owner {
            None => Err(StoreError::CommentNotFound(comment_id.to_string())),
            Some(owner) if owner != post_id => Err(StoreError::OwnershipMismatch {
                comment_id: comment_id.to_string(),
                post_id: post_id.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    async fn list_comments(&self, post_id: &str, request: &PageRequest) -> Result<Page<Comment>> {
        let page_size = request.page_size()?;
        if page_size == 0 {
            return Ok(Page::empty());
        }

        let limit = PageRequest::fetch_limit(page_size) as i64;
        let filter = post_id.to_string();
        let cursor = request.cursor().map(str::to_string);

        // `None` means the cursor did not resolve under this post
        let window: Option<Vec<Comment>> = self
            .run_in_transaction("select_comments", move |conn| {
                let post_id = filter.clone();
                let cursor = cursor.clone();
                Box::pin(async move {
                    let Some(cursor) = cursor else {
                        let rows = sqlx::query_as::<_, Comment>(
                            r#"
                            SELECT id, post_id, parent_id, text, created_at
                            FROM comments
                            WHERE post_id = $1
                            ORDER BY created_at ASC, id ASC
                            LIMIT $2
                            "#,
                        )
                        .bind(&post_id)
                        .bind(limit)
                        .fetch_all(&mut *conn)
                        .await?;
                        return Ok(Some(rows));
                    };

                    let key = sqlx::query_as::<_, (DateTime<Utc>, String)>(
                        "SELECT created_at, id FROM comments WHERE id = $1 AND post_id = $2",
                    )
                    .bind(&cursor)
                    .bind(&post_id)
                    .fetch_optional(&mut *conn)
                    .await?;

                    let Some((created_at, id)) = key else {
                        return Ok(None);
                    };

                    let rows = sqlx::query_as::<_, Comment>(
                        r#"
                        SELECT id, post_id, parent_id, text, created_at
                        FROM comments
                        WHERE post_id = $1 AND (created_at, id) > ($2, $3)
                        ORDER BY created_at ASC, id ASC
                        LIMIT $4
                        "#,
                    )
                    .bind(&post_id)
                    .bind(created_at)
                    .bind(id)
                    .bind(limit)
                    .fetch_all(&mut *conn)
                    .await?;
                    Ok::<_, sqlx::Error>(Some(rows))
                })
            })
            .await?;

        let window = window.ok_or_else(|| {
            StoreError::InvalidCursor(request.cursor().unwrap_or_default().to_string())
        })?;

        Ok(Page::from_window(window, page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_retryable() {
        assert!(EngineError(sqlx::Error::PoolTimedOut).is_retryable());
    }

    #[test]
    fn test_missing_row_is_not_retryable() {
        assert!(!EngineError(sqlx::Error::RowNotFound).is_retryable());
    }

    #[test]
    fn test_protocol_message_fallback() {
        let err = EngineError(sqlx::Error::Protocol(
            "could not serialize access due to concurrent update".to_string(),
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_display_is_engine_message() {
        let err = EngineError(sqlx::Error::PoolTimedOut);
        assert_eq!(err.to_string(), sqlx::Error::PoolTimedOut.to_string());
    }
}
