/// Business logic layer for content-service
pub mod posts;

pub use posts::ContentService;
