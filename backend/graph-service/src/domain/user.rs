use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use social_common::{Payload, UserId};

/// A user with its cached follower/following counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub profile: Payload,
    pub follower_count: u64,
    pub following_count: u64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New user with zeroed counters
    pub fn new(id: UserId, profile: Payload) -> Self {
        Self {
            id,
            profile,
            follower_count: 0,
            following_count: 0,
            created_at: Utc::now(),
        }
    }
}
