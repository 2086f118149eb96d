pub mod timeline_repo;

pub use timeline_repo::{MemoryTimelineStore, TimelineStore};

#[cfg(test)]
pub use timeline_repo::MockTimelineStore;
