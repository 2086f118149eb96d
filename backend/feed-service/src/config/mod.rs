use serde::{Deserialize, Serialize};

/// Feed engine settings, read from `FEED_*` environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Fan-out worker tasks
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Pending fan-out jobs before `post` waits for room
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Concurrent timeline writes within one fan-out job
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,
    /// Per-owner timeline cap; oldest entries are evicted beyond it
    #[serde(default = "default_max_timeline_entries")]
    pub max_timeline_entries: usize,
    /// Deliver a post to its author's own timeline too
    #[serde(default)]
    pub include_author: bool,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            write_concurrency: default_write_concurrency(),
            max_timeline_entries: default_max_timeline_entries(),
            include_author: false,
            max_page_size: default_max_page_size(),
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("FEED_").from_env()
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("FEED_").from_iter(vars)
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_write_concurrency() -> usize {
    32
}

fn default_max_timeline_entries() -> usize {
    1000
}

fn default_max_page_size() -> usize {
    1000
}
