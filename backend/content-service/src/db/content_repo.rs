use crate::models::Content;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use social_common::{ContentId, Result, SocialError, UserId};
use std::collections::BTreeSet;

/// Storage contract for immutable content
#[async_trait::async_trait]
pub trait ContentRepository: Send + Sync {
    async fn insert(&self, content: &Content) -> Result<()>;

    async fn get(&self, id: ContentId) -> Result<Option<Content>>;

    /// Batch lookup preserving input order; unknown ids are dropped
    async fn get_many(&self, ids: &[ContentId]) -> Result<Vec<Content>>;

    /// Up to `limit` items by `author`, newest first, strictly older than
    /// `anchor` when one is given
    async fn list_by_author(
        &self,
        author: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<Content>>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory content repository.
///
/// Records land in `by_id` before their id is indexed under the author, so a
/// listing never sees an id it cannot resolve.
#[derive(Debug, Default)]
pub struct MemoryContentRepository {
    by_id: DashMap<ContentId, Content>,
    by_author: DashMap<UserId, BTreeSet<ContentId>>,
}

impl MemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait::async_trait]
impl ContentRepository for MemoryContentRepository {
    async fn insert(&self, content: &Content) -> Result<()> {
        match self.by_id.entry(content.id) {
            Entry::Occupied(_) => {
                return Err(SocialError::Internal(format!(
                    "content id {} already stored",
                    content.id
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(content.clone());
            }
        }

        self.by_author
            .entry(content.author.clone())
            .or_default()
            .insert(content.id);
        Ok(())
    }

    async fn get(&self, id: ContentId) -> Result<Option<Content>> {
        Ok(self.by_id.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_many(&self, ids: &[ContentId]) -> Result<Vec<Content>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn list_by_author(
        &self,
        author: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<Content>> {
        let ids: Vec<ContentId> = match self.by_author.get(author) {
            Some(history) => match anchor {
                Some(anchor) => history.range(..anchor).rev().take(limit).copied().collect(),
                None => history.iter().rev().take(limit).copied().collect(),
            },
            None => return Ok(Vec::new()),
        };

        self.get_many(&ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use social_common::Payload;

    fn content(raw_id: u64, author: &str, message: &str) -> Content {
        Content {
            id: ContentId::from_raw(raw_id),
            author: UserId::from(author),
            message: message.to_string(),
            payload: Payload::empty(),
            created_at: Utc::now(),
        }
    }

    fn messages(items: &[Content]) -> Vec<&str> {
        items.iter().map(|c| c.message.as_str()).collect()
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let repo = MemoryContentRepository::new();
        repo.insert(&content(1, "bob", "a")).await.unwrap();
        assert!(repo.insert(&content(1, "bob", "b")).await.is_err());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_exclusive_anchor() {
        let repo = MemoryContentRepository::new();
        for (id, msg) in [(10, "p1"), (20, "p2"), (30, "p3")] {
            repo.insert(&content(id, "bob", msg)).await.unwrap();
        }
        repo.insert(&content(25, "alice", "other")).await.unwrap();

        let bob = UserId::from("bob");
        let all = repo.list_by_author(&bob, None, 10).await.unwrap();
        assert_eq!(messages(&all), vec!["p3", "p2", "p1"]);

        let page = repo
            .list_by_author(&bob, Some(ContentId::from_raw(30)), 1)
            .await
            .unwrap();
        assert_eq!(messages(&page), vec!["p2"]);

        let tail = repo
            .list_by_author(&bob, Some(ContentId::from_raw(10)), 10)
            .await
            .unwrap();
        assert!(tail.is_empty());
    }

    #[tokio::test]
    async fn test_anchor_need_not_exist() {
        let repo = MemoryContentRepository::new();
        for id in [10, 20, 30] {
            repo.insert(&content(id, "bob", &id.to_string())).await.unwrap();
        }

        let page = repo
            .list_by_author(&UserId::from("bob"), Some(ContentId::from_raw(25)), 10)
            .await
            .unwrap();
        assert_eq!(messages(&page), vec!["20", "10"]);
    }

    #[tokio::test]
    async fn test_get_many_keeps_order_and_drops_misses() {
        let repo = MemoryContentRepository::new();
        repo.insert(&content(1, "bob", "one")).await.unwrap();
        repo.insert(&content(2, "bob", "two")).await.unwrap();

        let ids = [2, 99, 1].map(ContentId::from_raw);
        let found = repo.get_many(&ids).await.unwrap();
        assert_eq!(messages(&found), vec!["two", "one"]);
    }

    #[tokio::test]
    async fn test_unknown_author_is_empty() {
        let repo = MemoryContentRepository::new();
        let page = repo
            .list_by_author(&UserId::from("nobody"), None, 5)
            .await
            .unwrap();
        assert!(page.is_empty());
    }
}
