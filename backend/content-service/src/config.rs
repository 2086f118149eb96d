/// Configuration for the content store, read from `CONTENT_*` variables
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    /// Node id embedded in generated content ids (0-1023)
    #[serde(default)]
    pub node_id: u16,
    /// Upper bound applied to every page request
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            max_page_size: default_max_page_size(),
        }
    }
}

impl ContentConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("CONTENT_").from_env()
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("CONTENT_").from_iter(vars)
    }
}

fn default_max_page_size() -> usize {
    1000
}
