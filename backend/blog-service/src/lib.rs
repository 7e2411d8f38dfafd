//! Blog service library
//!
//! Posts and threaded comments over GraphQL, stored in memory or in
//! PostgreSQL. Comment creation is serialized per post, storage conflicts are
//! retried with backoff, comment listings use keyset pagination and new
//! comments are fanned out to subscribers.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod locks;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod pagination;
pub mod schema;
pub mod services;

use resilience::CancelSignal;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::db::{BlogStore, MemoryStore, PgStore, StorageKind};
use crate::notifications::CommentNotifier;
use crate::services::BlogService;

pub use error::{Result, StoreError};

/// Opens the configured backend. `cancel` stops storage retries once fired.
pub async fn connect_store(
    config: &Config,
    cancel: CancelSignal,
) -> anyhow::Result<Arc<dyn BlogStore>> {
    let store: Arc<dyn BlogStore> = match config.storage.kind {
        StorageKind::InMemory => Arc::new(MemoryStore::new()),
        StorageKind::Postgres => {
            let database = config.storage.database.as_ref().ok_or_else(|| {
                anyhow::anyhow!("postgres storage selected without database settings")
            })?;
            Arc::new(PgStore::connect(database, config.storage.retry.clone(), cancel).await?)
        }
    };
    info!(storage = %config.storage.kind, "Storage backend ready");
    Ok(store)
}

/// Wires store, notifier and limits into the service used by the API layer.
pub async fn build_service(config: &Config, cancel: CancelSignal) -> anyhow::Result<BlogService> {
    let store = connect_store(config, cancel).await?;
    let notifier = CommentNotifier::new(config.notifications.capacity);
    Ok(BlogService::new(store, notifier).with_max_page_size(config.graphql.max_page_size))
}
