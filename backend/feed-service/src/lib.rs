//! Feed Engine
//!
//! Fan-out-on-write: publishing records the content, then a bounded worker
//! pool appends a `FeedEntry` to every follower's materialised timeline.
//! Reads page a user's own timeline newest first.

pub mod cache;
pub mod config;
pub mod db;
pub mod metrics;
pub mod models;
pub mod services;

pub use cache::RedisTimelineStore;
pub use config::FeedConfig;
pub use db::{MemoryTimelineStore, TimelineStore};
pub use models::{FanoutJob, FeedEntry};
pub use services::{FanoutDispatcher, FeedService};
