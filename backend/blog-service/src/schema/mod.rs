//! GraphQL schema: posts, threaded comments and comment subscriptions

pub mod comment;
pub mod post;
pub mod subscription;

use async_graphql::{Context, ErrorExtensions, MergedObject, Schema};

use crate::config::GraphQLConfig;
use crate::error::StoreError;
use crate::services::BlogService;

/// Root query object
#[derive(MergedObject, Default)]
pub struct QueryRoot(post::PostQuery);

/// Root mutation object
#[derive(MergedObject, Default)]
pub struct MutationRoot(post::PostMutation, comment::CommentMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, subscription::SubscriptionRoot>;

/// Build the schema around a service, applying query limits from config
pub fn build_schema(service: BlogService, config: &GraphQLConfig) -> AppSchema {
    let builder = Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        subscription::SubscriptionRoot,
    )
    .data(service)
    .limit_depth(config.max_depth)
    .limit_complexity(config.max_complexity);

    if config.introspection {
        builder.finish()
    } else {
        builder.disable_introspection().finish()
    }
}

impl ErrorExtensions for StoreError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

pub(crate) fn service<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a BlogService> {
    ctx.data::<BlogService>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::notifications::CommentNotifier;
    use std::sync::Arc;

    fn schema(config: &GraphQLConfig) -> AppSchema {
        let service = BlogService::new(Arc::new(MemoryStore::new()), CommentNotifier::default());
        build_schema(service, config)
    }

    #[test]
    fn test_schema_builds() {
        let sdl = schema(&GraphQLConfig::default()).sdl();
        assert!(sdl.contains("type Query"));
        assert!(sdl.contains("type CommentConnection"));
        assert!(sdl.contains("commentAdded(postId: ID!): Comment!"));
    }

    #[tokio::test]
    async fn test_introspection_can_be_disabled() {
        let config = GraphQLConfig {
            introspection: false,
            ..Default::default()
        };
        let query = "{ __schema { queryType { name } } }";

        let hidden = schema(&config).execute(query).await.data.into_json().unwrap();
        assert!(hidden["__schema"].is_null());

        let visible = schema(&GraphQLConfig::default())
            .execute(query)
            .await
            .data
            .into_json()
            .unwrap();
        assert_eq!(visible["__schema"]["queryType"]["name"], "Query");
    }

    #[test]
    fn test_store_error_code_extension() {
        let err = StoreError::InvalidCursor("c9".to_string()).extend();
        assert_eq!(err.message, "invalid cursor: c9");
        let code = err
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .cloned();
        assert_eq!(code, Some(async_graphql::Value::from("INVALID_CURSOR")));
    }
}
