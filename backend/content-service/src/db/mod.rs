/// Database access layer
///
/// - `content_repo`: repository contract and the in-memory implementation
/// - `post_repo`: PostgreSQL implementation and schema bootstrap
pub mod content_repo;
pub mod post_repo;

pub use content_repo::{ContentRepository, MemoryContentRepository};
pub use post_repo::{ensure_content_tables, PostgresContentRepository};
