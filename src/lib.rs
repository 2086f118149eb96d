//! Socialite backend wiring
//!
//! Builds the user graph, content store and feed engine over either
//! in-memory stores or PostgreSQL/Redis, depending on the environment.

pub mod backend;
pub mod config;

pub use backend::SocialBackend;
pub use config::AppConfig;

pub use content_service::{Content, ContentService};
pub use feed_service::{FeedEntry, FeedService};
pub use graph_service::{AggregateStrategy, FriendsOfFriends, IterativeStrategy, User, UserGraphService};
pub use social_common::{ContentId, Payload, Result, SocialError, UserId};

/// Install tracing with the workspace default filter
pub fn init_tracing() {
    social_common::telemetry::init_tracing(social_common::telemetry::DEFAULT_LOG_FILTER);
}
