/// Content service - publication, lookup and author history
use crate::config::ContentConfig;
use crate::db::{ContentRepository, MemoryContentRepository};
use crate::ids::ContentIdGenerator;
use crate::models::Content;
use chrono::{TimeZone, Utc};
use social_common::{ContentId, Payload, Result, SocialError, UserId};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ContentService {
    repo: Arc<dyn ContentRepository>,
    ids: Arc<ContentIdGenerator>,
    config: ContentConfig,
}

impl ContentService {
    pub fn new(repo: Arc<dyn ContentRepository>, config: ContentConfig) -> Result<Self> {
        let ids = ContentIdGenerator::new(config.node_id)?;
        Ok(Self {
            repo,
            ids: Arc::new(ids),
            config,
        })
    }

    pub fn in_memory(config: ContentConfig) -> Result<Self> {
        Self::new(Arc::new(MemoryContentRepository::new()), config)
    }

    /// Store a new content item and return it.
    ///
    /// Author existence is the caller's concern. `created_at` is taken from
    /// the id so both orderings agree.
    pub async fn publish_content(
        &self,
        author: &UserId,
        message: impl Into<String>,
        payload: Payload,
    ) -> Result<Content> {
        let id = self.ids.next_id();
        let created_at = Utc
            .timestamp_millis_opt(id.timestamp_millis() as i64)
            .single()
            .unwrap_or_else(Utc::now);

        let content = Content {
            id,
            author: author.clone(),
            message: message.into(),
            payload,
            created_at,
        };
        self.repo.insert(&content).await?;

        info!(content_id = %id, author = %author, "Content published");
        Ok(content)
    }

    pub async fn get_content(&self, id: ContentId) -> Result<Content> {
        self.repo
            .get(id)
            .await?
            .ok_or(SocialError::ContentNotFound(id))
    }

    /// Batch lookup; missing ids are skipped and order is preserved
    pub async fn get_contents(&self, ids: &[ContentId]) -> Result<Vec<Content>> {
        self.repo.get_many(ids).await
    }

    /// Up to `limit` posts by `author`, newest first, older than `anchor`
    pub async fn get_posts_by(
        &self,
        author: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<Content>> {
        let limit = limit.min(self.config.max_page_size);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let posts = self.repo.list_by_author(author, anchor, limit).await?;
        debug!(author = %author, anchor = ?anchor, returned = posts.len(), "Listed posts");
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ContentService {
        ContentService::in_memory(ContentConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_publish_then_get() {
        let service = service();
        let bob = UserId::from("bob");
        let payload = Payload::parse(r#"{"tags": ["intro"]}"#).unwrap();

        let content = service
            .publish_content(&bob, "hello", payload.clone())
            .await
            .unwrap();
        let fetched = service.get_content(content.id).await.unwrap();

        assert_eq!(fetched, content);
        assert_eq!(fetched.payload, payload);
        assert_eq!(
            fetched.created_at.timestamp_millis() as u64,
            content.id.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_missing_content() {
        let err = service()
            .get_content(ContentId::from_raw(7))
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::ContentNotFound(id) if id.as_u64() == 7));
    }

    #[tokio::test]
    async fn test_two_posts_anchor_walk() {
        let service = service();
        let author = UserId::from("author");
        let p1 = service
            .publish_content(&author, "P1", Payload::empty())
            .await
            .unwrap();
        let p2 = service
            .publish_content(&author, "P2", Payload::empty())
            .await
            .unwrap();

        let first = service.get_posts_by(&author, None, 1).await.unwrap();
        assert_eq!(first, vec![p2.clone()]);

        let second = service.get_posts_by(&author, Some(p2.id), 1).await.unwrap();
        assert_eq!(second, vec![p1.clone()]);

        let done = service.get_posts_by(&author, Some(p1.id), 1).await.unwrap();
        assert!(done.is_empty());
    }

    #[tokio::test]
    async fn test_page_size_clamped() {
        let config = ContentConfig {
            max_page_size: 3,
            ..ContentConfig::default()
        };
        let service = ContentService::in_memory(config).unwrap();
        let author = UserId::from("author");
        for n in 0..5 {
            service
                .publish_content(&author, format!("m{}", n), Payload::empty())
                .await
                .unwrap();
        }

        assert_eq!(service.get_posts_by(&author, None, 100).await.unwrap().len(), 3);
        assert!(service.get_posts_by(&author, None, 0).await.unwrap().is_empty());
    }
}
