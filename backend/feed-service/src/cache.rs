//! Redis-backed timeline store
//!
//! One sorted set per owner: `feed:timeline:{owner}`.
//! Every member has score 0 and the form `{content_id_hex}|{entry_json}`,
//! so lexicographic order is content id order (hex ids are fixed width).
//! Reads use `ZREVRANGEBYLEX` with an exclusive `(anchor` bound; the cap is
//! enforced with `ZREMRANGEBYRANK` in the same pipeline as the insert.

use crate::db::TimelineStore;
use crate::models::FeedEntry;
use redis::aio::ConnectionManager;
use social_common::{ContentId, Result, SocialError, UserId};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct RedisTimelineStore {
    client: ConnectionManager,
    max_entries: usize,
}

impl RedisTimelineStore {
    pub async fn new(redis_url: &str, max_entries: usize) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self::with_manager(manager, max_entries))
    }

    pub fn with_manager(client: ConnectionManager, max_entries: usize) -> Self {
        Self {
            client,
            max_entries: max_entries.max(1),
        }
    }

    /// Ping Redis to check connection health
    pub async fn ping(&self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.client.clone())
            .await
            .map_err(|e| {
                warn!("Redis PING failed: {}", e);
                SocialError::Cache(e)
            })?;
        Ok(())
    }

    fn key(owner: &UserId) -> String {
        format!("feed:timeline:{}", owner)
    }

    fn encode(entry: &FeedEntry) -> Result<String> {
        Ok(format!(
            "{}|{}",
            entry.content_id,
            serde_json::to_string(entry)?
        ))
    }

    fn decode(member: &str) -> Result<FeedEntry> {
        let (_, json) = member.split_once('|').ok_or_else(|| {
            SocialError::Internal(format!("malformed timeline member: {}", member))
        })?;
        Ok(serde_json::from_str(json)?)
    }
}

#[async_trait::async_trait]
impl TimelineStore for RedisTimelineStore {
    async fn append(&self, entry: FeedEntry) -> Result<()> {
        let key = Self::key(&entry.owner);
        let member = Self::encode(&entry)?;
        let keep_from = -(self.max_entries as i64) - 1;

        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(&key)
            .arg(0)
            .arg(&member)
            .ignore()
            .cmd("ZREMRANGEBYRANK")
            .arg(&key)
            .arg(0)
            .arg(keep_from)
            .ignore()
            .query_async::<_, ()>(&mut self.client.clone())
            .await
            .map_err(|e| {
                warn!("Redis timeline append failed for {}: {}", key, e);
                SocialError::Cache(e)
            })?;

        debug!(owner = %entry.owner, content_id = %entry.content_id, "Appended timeline entry");
        Ok(())
    }

    async fn range(
        &self,
        owner: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<FeedEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let key = Self::key(owner);
        let max = match anchor {
            Some(anchor) => format!("({}", anchor),
            None => "+".to_string(),
        };

        let members: Vec<String> = redis::cmd("ZREVRANGEBYLEX")
            .arg(&key)
            .arg(&max)
            .arg("-")
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut self.client.clone())
            .await?;

        members.iter().map(|m| Self::decode(m)).collect()
    }

    async fn remove(&self, owner: &UserId, content_id: ContentId) -> Result<()> {
        // Every member for this id sorts between "{id}|" and "{id}}"
        redis::cmd("ZREMRANGEBYLEX")
            .arg(Self::key(owner))
            .arg(format!("[{}|", content_id))
            .arg(format!("({}}}", content_id))
            .query_async::<_, ()>(&mut self.client.clone())
            .await?;
        Ok(())
    }

    async fn clear(&self, owner: &UserId) -> Result<()> {
        redis::cmd("DEL")
            .arg(Self::key(owner))
            .query_async::<_, ()>(&mut self.client.clone())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(owner: &str, raw_id: u64) -> FeedEntry {
        FeedEntry {
            owner: UserId::from(owner),
            content_id: ContentId::from_raw(raw_id),
            author: UserId::from("author"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_member_encoding_sorts_by_id() {
        let older = RedisTimelineStore::encode(&entry("alice", 0xff)).unwrap();
        let newer = RedisTimelineStore::encode(&entry("alice", 0x100)).unwrap();
        assert!(older < newer);
        assert!(older.starts_with("00000000000000ff|"));

        let decoded = RedisTimelineStore::decode(&newer).unwrap();
        assert_eq!(decoded.content_id, ContentId::from_raw(0x100));
    }

    #[test]
    fn test_malformed_member() {
        assert!(RedisTimelineStore::decode("no-separator").is_err());
    }

    // NOTE: requires a running Redis instance
    // Run with: REDIS_URL=redis://... cargo test -p feed-service -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_redis_range_and_cap() {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
        let store = RedisTimelineStore::new(&url, 3).await.expect("connect");
        let owner = format!("redis-test-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());

        for id in 1..=5 {
            store.append(entry(&owner, id)).await.unwrap();
        }
        let owner = UserId::new(owner);

        let all = store.range(&owner, None, 10).await.unwrap();
        let ids: Vec<u64> = all.iter().map(|e| e.content_id.as_u64()).collect();
        assert_eq!(ids, vec![5, 4, 3]);

        let page = store
            .range(&owner, Some(ContentId::from_raw(4)), 10)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);

        store.remove(&owner, ContentId::from_raw(5)).await.unwrap();
        let all = store.range(&owner, None, 10).await.unwrap();
        assert_eq!(all[0].content_id, ContentId::from_raw(4));

        store.clear(&owner).await.unwrap();
    }
}
