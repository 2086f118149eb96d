/// Data models for content-service
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use social_common::{ContentId, Payload, UserId};

/// A published content item. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub author: UserId,
    pub message: String,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
}
