use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use social_common::{ContentId, UserId};

/// Reference to a content item in one owner's timeline.
///
/// Holds ids only; the content body stays in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub owner: UserId,
    pub content_id: ContentId,
    pub author: UserId,
    pub created_at: DateTime<Utc>,
}

/// One queued fan-out: deliver `content_id` to the author's followers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutJob {
    pub content_id: ContentId,
    pub author: UserId,
    pub created_at: DateTime<Utc>,
}

impl FanoutJob {
    pub fn entry_for(&self, owner: &UserId) -> FeedEntry {
        FeedEntry {
            owner: owner.clone(),
            content_id: self.content_id,
            author: self.author.clone(),
            created_at: self.created_at,
        }
    }
}
