use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use social_common::{Result, SocialError, UserId};

/// Directed follow edge (follower -> followee)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    /// Rejects self-follows before any storage is touched
    pub fn new_follow(follower_id: UserId, followee_id: UserId) -> Result<Self> {
        if follower_id == followee_id {
            return Err(SocialError::SelfFollow(follower_id));
        }

        Ok(Self {
            follower_id,
            followee_id,
            created_at: Utc::now(),
        })
    }
}

/// Counter snapshot for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub user_id: UserId,
    pub followers_count: u64,
    pub following_count: u64,
}
