use super::content_repo::ContentRepository;
use crate::models::Content;
use chrono::{DateTime, Utc};
use social_common::{ContentId, Payload, Result, SocialError, UserId};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{debug, info};

/// PostgreSQL content repository.
///
/// Content ids are stored as `BIGINT`; the top bit is never set, so the
/// signed column orders exactly like the id.
#[derive(Clone)]
pub struct PostgresContentRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: i64,
    author_id: String,
    message: String,
    payload: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ContentRow> for Content {
    type Error = SocialError;

    fn try_from(row: ContentRow) -> Result<Self> {
        Ok(Content {
            id: ContentId::from_raw(row.id as u64),
            author: UserId::from(row.author_id),
            message: row.message,
            payload: Payload::from_value(row.payload.0)?,
            created_at: row.created_at,
        })
    }
}

fn to_sql_id(id: ContentId) -> Result<i64> {
    i64::try_from(id.as_u64()).map_err(|_| SocialError::InvalidContentId(id.to_string()))
}

impl PostgresContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ContentRepository for PostgresContentRepository {
    async fn insert(&self, content: &Content) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO content (id, author_id, message, payload, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(to_sql_id(content.id)?)
        .bind(content.author.as_str())
        .bind(&content.message)
        .bind(Json(content.payload.as_map()))
        .bind(content.created_at)
        .execute(&self.pool)
        .await?;

        debug!(content_id = %content.id, author = %content.author, "Stored content");
        Ok(())
    }

    async fn get(&self, id: ContentId) -> Result<Option<Content>> {
        let row: Option<ContentRow> = sqlx::query_as(
            "SELECT id, author_id, message, payload, created_at FROM content WHERE id = $1",
        )
        .bind(to_sql_id(id)?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Content::try_from).transpose()
    }

    async fn get_many(&self, ids: &[ContentId]) -> Result<Vec<Content>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql_ids = ids
            .iter()
            .map(|id| to_sql_id(*id))
            .collect::<Result<Vec<i64>>>()?;

        let rows: Vec<ContentRow> = sqlx::query_as(
            "SELECT id, author_id, message, payload, created_at FROM content WHERE id = ANY($1)",
        )
        .bind(&sql_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: HashMap<i64, ContentRow> = rows.into_iter().map(|r| (r.id, r)).collect();
        sql_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(Content::try_from)
            .collect()
    }

    async fn list_by_author(
        &self,
        author: &UserId,
        anchor: Option<ContentId>,
        limit: usize,
    ) -> Result<Vec<Content>> {
        let anchor = anchor.map(to_sql_id).transpose()?;
        let rows: Vec<ContentRow> = sqlx::query_as(
            r#"
            SELECT id, author_id, message, payload, created_at
            FROM content
            WHERE author_id = $1 AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(author.as_str())
        .bind(anchor)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Content::try_from).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Ensure the content table exists.
///
/// Created lazily at startup so environments without applied migrations
/// still work.
pub async fn ensure_content_tables(pool: &PgPool) -> Result<()> {
    info!("Ensuring PostgreSQL content tables exist");

    sqlx::query(CONTENT_TABLE).execute(pool).await?;
    sqlx::query(CONTENT_AUTHOR_INDEX).execute(pool).await?;

    Ok(())
}

const CONTENT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS content (
    id BIGINT PRIMARY KEY,
    author_id TEXT NOT NULL,
    message TEXT NOT NULL,
    payload JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CONTENT_AUTHOR_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_content_author_id ON content (author_id, id DESC)";
