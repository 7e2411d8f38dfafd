//! Post queries, mutations and the `Post` object

use async_graphql::{Context, ErrorExtensions, Object, Result as GraphQLResult, ID};
use chrono::{DateTime, Utc};

use super::comment::CommentConnection;
use super::service;
use crate::models::Post;
use crate::pagination::PageRequest;

pub struct PostNode(pub Post);

#[Object(name = "Post")]
impl PostNode {
    async fn id(&self) -> ID {
        ID(self.0.id.clone())
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn content(&self) -> &str {
        &self.0.content
    }

    async fn comments_allowed(&self) -> bool {
        self.0.comments_allowed
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.0.created_at
    }

    /// Comments in creation order. `first` is required; `after` is the
    /// cursor of the last comment already seen.
    async fn comments(
        &self,
        ctx: &Context<'_>,
        first: Option<i32>,
        after: Option<String>,
    ) -> GraphQLResult<CommentConnection> {
        let page = service(ctx)?
            .comments(&self.0.id, &PageRequest::new(first, after))
            .await
            .map_err(|e| e.extend())?;
        Ok(page.into())
    }
}

impl From<Post> for PostNode {
    fn from(post: Post) -> Self {
        PostNode(post)
    }
}

#[derive(Default)]
pub struct PostQuery;

#[Object]
impl PostQuery {
    async fn posts(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<PostNode>> {
        let posts = service(ctx)?.posts().await.map_err(|e| e.extend())?;
        Ok(posts.into_iter().map(PostNode::from).collect())
    }

    async fn post(&self, ctx: &Context<'_>, id: ID) -> GraphQLResult<PostNode> {
        let post = service(ctx)?.post(&id).await.map_err(|e| e.extend())?;
        Ok(post.into())
    }
}

#[derive(Default)]
pub struct PostMutation;

#[Object]
impl PostMutation {
    async fn create_post(
        &self,
        ctx: &Context<'_>,
        title: String,
        content: String,
        #[graphql(default = true)] comments_allowed: bool,
    ) -> GraphQLResult<PostNode> {
        let post = service(ctx)?
            .create_post(title, content, comments_allowed)
            .await
            .map_err(|e| e.extend())?;
        Ok(post.into())
    }
}
