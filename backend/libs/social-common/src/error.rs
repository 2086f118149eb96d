//! Unified error handling for the social services
//!
//! Every service returns `SocialError` so failures cross service boundaries
//! without re-wrapping.

use crate::models::{ContentId, UserId};
use thiserror::Error;

/// Result type alias for social services
pub type Result<T> = std::result::Result<T, SocialError>;

#[derive(Error, Debug)]
pub enum SocialError {
    /// Referenced user does not exist
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// User id is already taken
    #[error("User already exists: {0}")]
    DuplicateUser(UserId),

    /// Follower and followee are the same user
    #[error("User cannot follow themselves: {0}")]
    SelfFollow(UserId),

    /// Content lookup by id missed
    #[error("Content not found: {0}")]
    ContentNotFound(ContentId),

    /// Opaque payload is not a JSON object
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Cursor string is not a content id
    #[error("Invalid content id: {0}")]
    InvalidContentId(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Fan-out queue has been closed
    #[error("Fan-out dispatcher unavailable")]
    FanoutUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SocialError {
    /// True for lookups that missed (user or content)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UserNotFound(_) | Self::ContentNotFound(_))
    }
}

impl From<anyhow::Error> for SocialError {
    fn from(err: anyhow::Error) -> Self {
        SocialError::Internal(err.to_string())
    }
}
