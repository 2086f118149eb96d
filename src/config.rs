use content_service::ContentConfig;
use feed_service::FeedConfig;
use graph_service::GraphConfig;
use serde::Deserialize;

/// Storage endpoints; unset URLs select the in-memory stores
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: default_db_max_connections(),
            redis_url: None,
        }
    }
}

fn default_db_max_connections() -> u32 {
    20
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub graph: GraphConfig,
    pub content: ContentConfig,
    pub feed: FeedConfig,
}

impl AppConfig {
    /// Load `.env` if present, then read every section from the environment
    pub fn from_env() -> Result<Self, envy::Error> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            storage: envy::from_env()?,
            graph: GraphConfig::from_env()?,
            content: ContentConfig::from_env()?,
            feed: FeedConfig::from_env()?,
        })
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        Ok(Self {
            storage: envy::from_iter(vars.clone())?,
            graph: GraphConfig::from_iter(vars.clone())?,
            content: ContentConfig::from_iter(vars.clone())?,
            feed: FeedConfig::from_iter(vars)?,
        })
    }
}
