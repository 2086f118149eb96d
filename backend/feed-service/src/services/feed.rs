use crate::config::FeedConfig;
use crate::db::{MemoryTimelineStore, TimelineStore};
use crate::models::{FanoutJob, FeedEntry};
use crate::services::fanout::{FanoutDispatcher, FanoutWorker};
use content_service::{Content, ContentService};
use graph_service::UserGraphService;
use social_common::{ContentId, Payload, Result, UserId};
use std::sync::Arc;
use tracing::{debug, info};

/// Publication and timeline reads.
///
/// `publish` returns once the content is stored and its fan-out job is
/// queued; followers see the entry after a worker delivers it.
#[derive(Clone)]
pub struct FeedService {
    graph: UserGraphService,
    content: ContentService,
    timelines: Arc<dyn TimelineStore>,
    dispatcher: Arc<FanoutDispatcher>,
    config: FeedConfig,
}

impl FeedService {
    /// Spawns the fan-out workers; call from inside a Tokio runtime
    pub fn new(
        graph: UserGraphService,
        content: ContentService,
        timelines: Arc<dyn TimelineStore>,
        config: FeedConfig,
    ) -> Self {
        let worker = Arc::new(FanoutWorker::new(
            graph.clone(),
            Arc::clone(&timelines),
            &config,
        ));
        let dispatcher = Arc::new(FanoutDispatcher::start(
            worker,
            config.workers,
            config.queue_capacity,
        ));
        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Feed service started"
        );

        Self {
            graph,
            content,
            timelines,
            dispatcher,
            config,
        }
    }

    pub fn in_memory(graph: UserGraphService, content: ContentService, config: FeedConfig) -> Self {
        let timelines = Arc::new(MemoryTimelineStore::new(config.max_timeline_entries));
        Self::new(graph, content, timelines, config)
    }

    pub fn graph(&self) -> &UserGraphService {
        &self.graph
    }

    pub fn content(&self) -> &ContentService {
        &self.content
    }

    /// Validate the author, store the content, queue its fan-out.
    ///
    /// The queue slot is claimed before the content is written, so a
    /// stopped dispatcher fails the call with nothing stored.
    pub async fn publish(
        &self,
        author: &UserId,
        message: impl Into<String>,
        payload: Payload,
    ) -> Result<ContentId> {
        self.graph.validate_user(author).await?;
        let permit = self.dispatcher.reserve().await?;

        let content = self.content.publish_content(author, message, payload).await?;
        permit.send(FanoutJob {
            content_id: content.id,
            author: author.clone(),
            created_at: content.created_at,
        });
        debug!(author = %author, content_id = %content.id, "Fan-out queued");
        Ok(content.id)
    }

    /// Queue fan-out of already stored `content` to `author`'s followers
    pub async fn post(&self, author: &UserId, content: &Content) -> Result<()> {
        let job = FanoutJob {
            content_id: content.id,
            author: author.clone(),
            created_at: content.created_at,
        };
        self.dispatcher.enqueue(job).await?;
        debug!(author = %author, content_id = %content.id, "Fan-out queued");
        Ok(())
    }

    /// Up to `limit` timeline entries for `user`, newest first
    pub async fn get_feed_for(
        &self,
        user: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<FeedEntry>> {
        self.graph.validate_user(user).await?;
        let limit = limit.min(self.config.max_page_size);
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.timelines.range(user, anchor, limit).await
    }

    /// `get_feed_for` hydrated into content records
    pub async fn get_timeline(
        &self,
        user: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<Content>> {
        let entries = self.get_feed_for(user, anchor, limit).await?;
        let ids: Vec<ContentId> = entries.iter().map(|e| e.content_id).collect();
        self.content.get_contents(&ids).await
    }

    /// Posts written by `user`, newest first
    pub async fn get_posts_by(
        &self,
        user: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<Content>> {
        self.graph.validate_user(user).await?;
        self.content.get_posts_by(user, anchor, limit).await
    }

    /// Drop `user`'s materialised timeline
    pub async fn purge_timeline(&self, user: &UserId) -> Result<()> {
        self.timelines.clear(user).await?;
        debug!(user = %user, "Timeline purged");
        Ok(())
    }

    /// Resolve once every queued fan-out has been delivered
    pub async fn wait_idle(&self) {
        self.dispatcher.wait_idle().await;
    }

    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_service::ContentConfig;
    use graph_service::GraphConfig;
    use social_common::SocialError;

    async fn feed_with(users: &[&str]) -> FeedService {
        let graph = UserGraphService::in_memory(GraphConfig::default());
        for id in users {
            graph.create_user(UserId::from(*id), Payload::empty()).await.unwrap();
        }
        let content = ContentService::in_memory(ContentConfig::default()).unwrap();
        FeedService::in_memory(graph, content, FeedConfig::default())
    }

    #[tokio::test]
    async fn test_publish_unknown_author_stores_nothing() {
        let feed = feed_with(&[]).await;
        let ghost = UserId::from("ghost");

        let err = feed.publish(&ghost, "boo", Payload::empty()).await.unwrap_err();
        assert!(matches!(err, SocialError::UserNotFound(_)));

        let posts = feed.content().get_posts_by(&ghost, None, 10).await.unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_author_timeline_empty_by_default() {
        let feed = feed_with(&["bob"]).await;
        let bob = UserId::from("bob");

        feed.publish(&bob, "solo", Payload::empty()).await.unwrap();
        feed.wait_idle().await;

        assert!(feed.get_feed_for(&bob, None, 10).await.unwrap().is_empty());
        assert_eq!(feed.get_posts_by(&bob, None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timeline_hydrates_content() {
        let feed = feed_with(&["alice", "bob"]).await;
        let (alice, bob) = (UserId::from("alice"), UserId::from("bob"));
        feed.graph().follow(&alice, &bob).await.unwrap();

        let payload = Payload::parse(r#"{"mood": "sunny"}"#).unwrap();
        feed.publish(&bob, "hello", payload.clone()).await.unwrap();
        feed.wait_idle().await;

        let timeline = feed.get_timeline(&alice, None, 50).await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].author, bob);
        assert_eq!(timeline[0].message, "hello");
        assert_eq!(timeline[0].payload, payload);
    }

    #[tokio::test]
    async fn test_reads_require_existing_user() {
        let feed = feed_with(&[]).await;
        let nobody = UserId::from("nobody");

        assert!(feed.get_feed_for(&nobody, None, 10).await.unwrap_err().is_not_found());
        assert!(feed.get_posts_by(&nobody, None, 10).await.unwrap_err().is_not_found());
    }
}
