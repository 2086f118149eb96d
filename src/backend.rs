use crate::config::AppConfig;
use anyhow::Context;
use content_service::db::ensure_content_tables;
use content_service::{ContentRepository, ContentService, MemoryContentRepository, PostgresContentRepository};
use feed_service::{FeedService, MemoryTimelineStore, RedisTimelineStore, TimelineStore};
use graph_service::repository::ensure_graph_tables;
use graph_service::{GraphRepositoryTrait, MemoryGraphRepository, PostgresGraphRepository, UserGraphService};
use social_common::{Result, UserId};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

/// The three services, wired together
#[derive(Clone)]
pub struct SocialBackend {
    pub graph: UserGraphService,
    pub content: ContentService,
    pub feed: FeedService,
}

impl SocialBackend {
    /// Everything in memory; call from inside a Tokio runtime
    pub fn in_memory(config: &AppConfig) -> Result<Self> {
        let graph = UserGraphService::new(
            Arc::new(MemoryGraphRepository::new()),
            config.graph.clone(),
        );
        let content = ContentService::new(
            Arc::new(MemoryContentRepository::new()),
            config.content.clone(),
        )?;
        let timelines = Arc::new(MemoryTimelineStore::new(config.feed.max_timeline_entries));

        Ok(Self::assemble(graph, content, timelines, config))
    }

    pub async fn from_env() -> anyhow::Result<Self> {
        let config = AppConfig::from_env().context("Failed to load configuration")?;
        Self::connect(&config).await
    }

    /// PostgreSQL when `DATABASE_URL` is set, Redis timelines when
    /// `REDIS_URL` is set, in-memory stores otherwise
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let graph_repo: Arc<dyn GraphRepositoryTrait>;
        let content_repo: Arc<dyn ContentRepository>;
        match &config.storage.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.storage.db_max_connections)
                    .connect(url)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                ensure_graph_tables(&pool)
                    .await
                    .context("Failed to create graph tables")?;
                ensure_content_tables(&pool)
                    .await
                    .context("Failed to create content tables")?;
                info!("Using PostgreSQL graph and content stores");

                graph_repo = Arc::new(PostgresGraphRepository::new(pool.clone()));
                content_repo = Arc::new(PostgresContentRepository::new(pool));
            }
            None => {
                info!("DATABASE_URL not set, using in-memory graph and content stores");
                graph_repo = Arc::new(MemoryGraphRepository::new());
                content_repo = Arc::new(MemoryContentRepository::new());
            }
        }

        let timelines: Arc<dyn TimelineStore> = match &config.storage.redis_url {
            Some(url) => {
                let store = RedisTimelineStore::new(url, config.feed.max_timeline_entries)
                    .await
                    .context("Failed to connect to Redis")?;
                info!("Using Redis timeline store");
                Arc::new(store)
            }
            None => Arc::new(MemoryTimelineStore::new(config.feed.max_timeline_entries)),
        };

        let graph = UserGraphService::new(graph_repo, config.graph.clone());
        let content = ContentService::new(content_repo, config.content.clone())
            .context("Invalid content configuration")?;

        Ok(Self::assemble(graph, content, timelines, config))
    }

    fn assemble(
        graph: UserGraphService,
        content: ContentService,
        timelines: Arc<dyn TimelineStore>,
        config: &AppConfig,
    ) -> Self {
        let feed = FeedService::new(graph.clone(), content.clone(), timelines, config.feed.clone());
        Self {
            graph,
            content,
            feed,
        }
    }

    /// Remove a user from the graph, then drop their timeline.
    /// Their authored content stays in the content store.
    pub async fn remove_user(&self, user_id: &UserId) -> Result<()> {
        self.graph.remove_user(user_id).await?;
        self.feed.purge_timeline(user_id).await?;
        info!(user_id = %user_id, "User and timeline removed");
        Ok(())
    }

    /// Drain pending fan-out and stop the workers
    pub async fn shutdown(&self) {
        self.feed.shutdown().await;
    }
}
