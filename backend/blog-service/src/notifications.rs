//! Comment-created fanout
//!
//! Each post with live subscribers owns a bounded broadcast ring, and every
//! subscriber holds its own cursor into that ring. Publishing never waits for
//! readers; a subscriber that falls more than `capacity` events behind on its
//! post skips the oldest ones and keeps going. Traffic on one post never
//! touches another post's queue.

use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::models::Comment;

pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct CommentNotifier {
    capacity: usize,
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Comment>>>>,
}

impl Default for CommentNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CommentNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Delivers `comment` to every live subscriber of its post. Returns how
    /// many subscribers were registered on that post at the time of publishing.
    pub fn publish(&self, comment: &Comment) -> usize {
        let mut topics = self.topics.lock();
        let Some(sender) = topics.get(&comment.post_id) else {
            return 0;
        };

        match sender.send(comment.clone()) {
            Ok(receivers) => {
                debug!(
                    post_id = %comment.post_id,
                    comment_id = %comment.id,
                    receivers,
                    "Published comment event"
                );
                receivers
            }
            // Every subscriber of this post is gone
            Err(_) => {
                topics.remove(&comment.post_id);
                0
            }
        }
    }

    /// Live subscribers across all posts.
    pub fn subscriber_count(&self) -> usize {
        self.topics
            .lock()
            .values()
            .map(broadcast::Sender::receiver_count)
            .sum()
    }

    /// Posts that currently hold a queue.
    pub fn topic_count(&self) -> usize {
        self.topics.lock().len()
    }

    /// Comments created on `post_id` from now on. The subscription is
    /// deregistered when the stream is dropped.
    pub fn subscribe(&self, post_id: &str) -> impl Stream<Item = Comment> + Send + 'static {
        let receiver = {
            let mut topics = self.topics.lock();
            topics.retain(|_, sender| sender.receiver_count() > 0);
            topics
                .entry(post_id.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        stream::unfold(
            (receiver, post_id.to_string()),
            |(mut receiver, post_id)| async move {
                loop {
                    match receiver.recv().await {
                        Ok(comment) => return Some((comment, (receiver, post_id))),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                post_id = %post_id,
                                skipped,
                                "Comment subscriber lagging, oldest events dropped"
                            );
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures_util::StreamExt;
    use std::time::Duration;

    fn comment(id: &str, post_id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            post_id: post_id.to_string(),
            parent_id: None,
            text: "hello".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_publish_without_subscribers_does_not_block() {
        let notifier = CommentNotifier::new(1);
        assert_eq!(notifier.publish(&comment("c1", "p1")), 0);
        assert_eq!(notifier.publish(&comment("c2", "p1")), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let notifier = CommentNotifier::new(8);
        let first = notifier.subscribe("p1");
        let second = notifier.subscribe("p1");
        tokio::pin!(first);
        tokio::pin!(second);

        assert_eq!(notifier.publish(&comment("c1", "p1")), 2);

        assert_eq!(first.next().await.unwrap().id, "c1");
        assert_eq!(second.next().await.unwrap().id, "c1");
    }

    #[tokio::test]
    async fn test_subscriber_only_sees_its_post() {
        let notifier = CommentNotifier::new(8);
        let stream = notifier.subscribe("p2");
        tokio::pin!(stream);

        notifier.publish(&comment("c1", "p1"));
        notifier.publish(&comment("c2", "p2"));

        assert_eq!(stream.next().await.unwrap().id, "c2");
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest() {
        let notifier = CommentNotifier::new(2);
        let stream = notifier.subscribe("p1");
        tokio::pin!(stream);

        for n in 1..=5 {
            notifier.publish(&comment(&format!("c{n}"), "p1"));
        }

        assert_eq!(stream.next().await.unwrap().id, "c4");
        assert_eq!(stream.next().await.unwrap().id, "c5");
    }

    #[tokio::test]
    async fn test_dropped_stream_deregisters() {
        let notifier = CommentNotifier::new(4);
        let stream = notifier.subscribe("p1");
        assert_eq!(notifier.subscriber_count(), 1);
        drop(stream);
        assert_eq!(notifier.subscriber_count(), 0);

        assert_eq!(notifier.publish(&comment("c1", "p1")), 0);
        assert_eq!(notifier.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_other_posts_do_not_evict_pending_event() {
        let notifier = CommentNotifier::new(2);
        let stream = notifier.subscribe("p1");
        tokio::pin!(stream);

        notifier.publish(&comment("mine", "p1"));
        for n in 1..=5 {
            notifier.publish(&comment(&format!("x{n}"), "p2"));
        }

        let next = tokio::time::timeout(Duration::from_secs(1), stream.next()).await;
        assert_eq!(next.unwrap().unwrap().id, "mine");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_does_not_affect_other_posts() {
        let notifier = CommentNotifier::new(2);
        let busy = notifier.subscribe("p1");
        let quiet = notifier.subscribe("p2");
        tokio::pin!(busy);
        tokio::pin!(quiet);

        notifier.publish(&comment("q1", "p2"));
        for n in 1..=5 {
            notifier.publish(&comment(&format!("c{n}"), "p1"));
        }
        notifier.publish(&comment("q2", "p2"));

        assert_eq!(busy.next().await.unwrap().id, "c4");
        assert_eq!(busy.next().await.unwrap().id, "c5");
        assert_eq!(quiet.next().await.unwrap().id, "q1");
        assert_eq!(quiet.next().await.unwrap().id, "q2");
        assert_eq!(notifier.topic_count(), 2);
    }

    #[tokio::test]
    async fn test_stream_ends_when_notifier_dropped() {
        let notifier = CommentNotifier::new(4);
        let stream = notifier.subscribe("p1");
        tokio::pin!(stream);
        drop(notifier);

        let next = tokio::time::timeout(Duration::from_secs(1), stream.next()).await;
        assert_eq!(next.unwrap(), None);
    }
}
