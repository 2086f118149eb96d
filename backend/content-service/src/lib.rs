/// Content Service Library
///
/// Immutable content records keyed by time-ordered ids, with newest-first
/// anchor pagination over each author's history.
///
/// # Modules
///
/// - `config`: Environment configuration
/// - `ids`: Content id generation
/// - `models`: The `Content` record
/// - `db`: Repository trait with in-memory and PostgreSQL implementations
/// - `services`: Business logic layer
pub mod config;
pub mod db;
pub mod ids;
pub mod models;
pub mod services;

pub use config::ContentConfig;
pub use db::{ContentRepository, MemoryContentRepository, PostgresContentRepository};
pub use ids::ContentIdGenerator;
pub use models::Content;
pub use services::ContentService;
