//! GraphQL subscriptions (WebSocket)

use async_graphql::{Context, Error, ErrorExtensions, Subscription, ID};
use futures_util::stream::{Stream, StreamExt};

use super::comment::CommentNode;
use super::service;

#[derive(Default)]
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Emits every comment created on `postId` after the subscription starts
    async fn comment_added(
        &self,
        ctx: &Context<'_>,
        post_id: ID,
    ) -> Result<impl Stream<Item = CommentNode>, Error> {
        let service = service(ctx)?;
        // Reject unknown posts up front instead of streaming nothing forever
        service.post(&post_id).await.map_err(|e| e.extend())?;
        Ok(service.subscribe_comments(&post_id).map(CommentNode::from))
    }
}
