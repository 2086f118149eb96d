use crate::models::FeedEntry;
use dashmap::DashMap;
use social_common::{ContentId, Result, UserId};
use std::collections::BTreeMap;

/// Per-owner materialised timelines.
///
/// Entries are keyed by content id, so appending the same content twice for
/// one owner leaves a single entry. Fan-out is at-least-once and relies on it.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TimelineStore: Send + Sync {
    /// Insert into `entry.owner`'s timeline, evicting the oldest entries past the cap
    async fn append(&self, entry: FeedEntry) -> Result<()>;

    /// Up to `limit` entries newest first, strictly older than `anchor` when given
    async fn range(
        &self,
        owner: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<FeedEntry>>;

    /// Drop one entry; a missing entry is not an error
    async fn remove(&self, owner: &UserId, content_id: ContentId) -> Result<()>;

    /// Drop an owner's timeline entirely
    async fn clear(&self, owner: &UserId) -> Result<()>;
}

#[derive(Debug)]
pub struct MemoryTimelineStore {
    timelines: DashMap<UserId, BTreeMap<ContentId, FeedEntry>>,
    max_entries: usize,
}

impl MemoryTimelineStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            timelines: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self, owner: &UserId) -> usize {
        self.timelines.get(owner).map(|t| t.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl TimelineStore for MemoryTimelineStore {
    async fn append(&self, entry: FeedEntry) -> Result<()> {
        let mut timeline = self.timelines.entry(entry.owner.clone()).or_default();
        timeline.insert(entry.content_id, entry);
        while timeline.len() > self.max_entries {
            timeline.pop_first();
        }
        Ok(())
    }

    async fn range(
        &self,
        owner: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<FeedEntry>> {
        let Some(timeline) = self.timelines.get(owner) else {
            return Ok(Vec::new());
        };

        let entries = match anchor {
            Some(anchor) => timeline
                .range(..anchor)
                .rev()
                .take(limit)
                .map(|(_, e)| e.clone())
                .collect(),
            None => timeline.values().rev().take(limit).cloned().collect(),
        };
        Ok(entries)
    }

    async fn remove(&self, owner: &UserId, content_id: ContentId) -> Result<()> {
        if let Some(mut timeline) = self.timelines.get_mut(owner) {
            timeline.remove(&content_id);
        }
        Ok(())
    }

    async fn clear(&self, owner: &UserId) -> Result<()> {
        self.timelines.remove(owner);
        Ok(())
    }
}
