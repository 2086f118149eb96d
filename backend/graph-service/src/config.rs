use serde::Deserialize;

/// User graph settings, read from `GRAPH_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Upper bound applied to every follower/following page request
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    /// Concurrent second-hop fetches in the iterative friend-of-friend traversal
    #[serde(default = "default_fof_concurrency")]
    pub fof_concurrency: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            fof_concurrency: default_fof_concurrency(),
        }
    }
}

impl GraphConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("GRAPH_").from_env()
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("GRAPH_").from_iter(vars)
    }
}

fn default_max_page_size() -> usize {
    1000
}

fn default_fof_concurrency() -> usize {
    16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = GraphConfig::from_iter(Vec::new()).unwrap();
        assert_eq!(config.max_page_size, 1000);
        assert_eq!(config.fof_concurrency, 16);
    }

    #[test]
    fn test_prefixed_overrides() {
        let config = GraphConfig::from_iter(vec![
            ("GRAPH_MAX_PAGE_SIZE".to_string(), "50".to_string()),
            ("GRAPH_FOF_CONCURRENCY".to_string(), "4".to_string()),
            ("FEED_WORKERS".to_string(), "99".to_string()),
        ])
        .unwrap();
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.fof_concurrency, 4);
    }
}
