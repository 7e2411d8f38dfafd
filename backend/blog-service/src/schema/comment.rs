//! Comment objects, the comment connection and comment mutations

use async_graphql::{Context, ErrorExtensions, Object, Result as GraphQLResult, SimpleObject, ID};
use chrono::{DateTime, Utc};

use super::service;
use crate::models::Comment;
use crate::pagination::Page;

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "Comment")]
pub struct CommentNode {
    pub id: ID,
    pub post_id: ID,
    pub parent_id: Option<ID>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentNode {
    fn from(comment: Comment) -> Self {
        CommentNode {
            id: ID(comment.id),
            post_id: ID(comment.post_id),
            parent_id: comment.parent_id.map(ID),
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct CommentEdge {
    /// Pass as `after` to continue after this comment
    pub cursor: String,
    pub node: CommentNode,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct CommentConnection {
    pub edges: Vec<CommentEdge>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl From<Page<Comment>> for CommentConnection {
    fn from(page: Page<Comment>) -> Self {
        let edges = page
            .items
            .into_iter()
            .map(|comment| CommentEdge {
                cursor: comment.id.clone(),
                node: comment.into(),
            })
            .collect();

        CommentConnection {
            edges,
            end_cursor: page.end_cursor,
            has_next_page: page.has_next_page,
        }
    }
}

#[derive(Default)]
pub struct CommentMutation;

#[Object]
impl CommentMutation {
    /// Adds a comment to a post, optionally as a reply to one of its comments
    async fn create_comment(
        &self,
        ctx: &Context<'_>,
        post_id: ID,
        parent_id: Option<ID>,
        text: String,
    ) -> GraphQLResult<CommentNode> {
        let comment = service(ctx)?
            .create_comment(&post_id, parent_id.map(|id| id.0), text)
            .await
            .map_err(|e| e.extend())?;
        Ok(comment.into())
    }
}
