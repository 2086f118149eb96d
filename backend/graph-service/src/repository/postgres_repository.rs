use super::GraphRepositoryTrait;
use crate::domain::edge::{Edge, GraphStats};
use crate::domain::user::User;
use chrono::{DateTime, Utc};
use social_common::{Payload, Result, SocialError, UserId};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};

/// PostgreSQL repository for the social graph.
///
/// Counters live on the `users` row and change in the same transaction as
/// the `follows` row they describe. Both endpoint rows are locked
/// (`FOR UPDATE`, ordered by id) before the edge is touched, which serialises
/// concurrent follow/unfollow of the same pair.
#[derive(Clone)]
pub struct PostgresGraphRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    profile: Json<serde_json::Value>,
    follower_count: i64,
    following_count: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = SocialError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: UserId::from(row.id),
            profile: Payload::from_value(row.profile.0)?,
            follower_count: row.follower_count.max(0) as u64,
            following_count: row.following_count.max(0) as u64,
            created_at: row.created_at,
        })
    }
}

fn to_sql_limit(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl PostgresGraphRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lock both endpoint rows in id order; `UserNotFound` names the missing one
    async fn lock_endpoints(
        tx: &mut Transaction<'_, Postgres>,
        follower_id: &UserId,
        followee_id: &UserId,
    ) -> Result<()> {
        let ids = vec![follower_id.to_string(), followee_id.to_string()];
        let locked: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(&ids)
                .fetch_all(&mut **tx)
                .await?;

        for expected in [follower_id, followee_id] {
            if !locked.iter().any(|(id,)| id == expected.as_str()) {
                return Err(SocialError::UserNotFound(expected.clone()));
            }
        }
        Ok(())
    }

    async fn page(
        &self,
        sql: &str,
        count_sql: &str,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<UserId>, u64, bool)> {
        let total: Option<i64> = sqlx::query_scalar(count_sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let total = total.unwrap_or(0).max(0) as u64;

        let rows: Vec<(String,)> = sqlx::query_as(sql)
            .bind(user_id.as_str())
            .bind(to_sql_limit(limit))
            .bind(to_sql_limit(offset))
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<UserId> = rows.into_iter().map(|(id,)| UserId::from(id)).collect();
        let has_more = (offset as u64).saturating_add(ids.len() as u64) < total;
        Ok((ids, total, has_more))
    }
}

#[async_trait::async_trait]
impl GraphRepositoryTrait for PostgresGraphRepository {
    async fn create_user(&self, user: &User) -> Result<()> {
        let inserted: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO users (id, profile, follower_count, following_count, created_at)
            VALUES ($1, $2, 0, 0, $3)
            ON CONFLICT (id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user.id.as_str())
        .bind(Json(user.profile.as_map()))
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_none() {
            return Err(SocialError::DuplicateUser(user.id.clone()));
        }

        debug!("Created user in PostgreSQL: {}", user.id);
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, profile, follower_count, following_count, created_at
             FROM users WHERE id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_users(&self, user_ids: &[UserId]) -> Result<Vec<User>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = user_ids.iter().map(|id| id.to_string()).collect();
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, profile, follower_count, following_count, created_at
             FROM users WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id: HashMap<String, UserRow> =
            rows.into_iter().map(|row| (row.id.clone(), row)).collect();

        user_ids
            .iter()
            .filter_map(|id| by_id.remove(id.as_str()))
            .map(User::try_from)
            .collect()
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Same id order as lock_endpoints, so concurrent follows cannot deadlock
        let locked: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE id = $1
               OR id IN (SELECT followee_id FROM follows WHERE follower_id = $1)
               OR id IN (SELECT follower_id FROM follows WHERE followee_id = $1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&mut *tx)
        .await?;
        if !locked.iter().any(|(id,)| id == user_id.as_str()) {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE users SET follower_count = follower_count - 1
            WHERE id IN (SELECT followee_id FROM follows WHERE follower_id = $1)
            "#,
        )
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users SET following_count = following_count - 1
            WHERE id IN (SELECT follower_id FROM follows WHERE followee_id = $1)
            "#,
        )
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await?;

        // follows rows go with the user via ON DELETE CASCADE
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Deleted user in PostgreSQL: {}", user_id);
        Ok(true)
    }

    async fn create_follow(&self, edge: &Edge) -> Result<bool> {
        if edge.follower_id == edge.followee_id {
            return Err(SocialError::SelfFollow(edge.follower_id.clone()));
        }

        let mut tx = self.pool.begin().await?;
        Self::lock_endpoints(&mut tx, &edge.follower_id, &edge.followee_id).await?;

        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO follows (follower_id, followee_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            RETURNING seq
            "#,
        )
        .bind(edge.follower_id.as_str())
        .bind(edge.followee_id.as_str())
        .bind(edge.created_at)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            return Ok(false);
        }

        sqlx::query("UPDATE users SET following_count = following_count + 1 WHERE id = $1")
            .bind(edge.follower_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET follower_count = follower_count + 1 WHERE id = $1")
            .bind(edge.followee_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(
            "Created FOLLOWS in PostgreSQL: {} -> {}",
            edge.follower_id, edge.followee_id
        );
        Ok(true)
    }

    async fn delete_follow(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool> {
        if follower_id == followee_id {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;
        match Self::lock_endpoints(&mut tx, follower_id, followee_id).await {
            Ok(()) => {}
            Err(SocialError::UserNotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        }

        let deleted: Option<(i64,)> = sqlx::query_as(
            "DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2 RETURNING seq",
        )
        .bind(follower_id.as_str())
        .bind(followee_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if deleted.is_none() {
            return Ok(false);
        }

        sqlx::query("UPDATE users SET following_count = following_count - 1 WHERE id = $1")
            .bind(follower_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET follower_count = follower_count - 1 WHERE id = $1")
            .bind(followee_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(
            "Deleted FOLLOWS in PostgreSQL: {} -> {}",
            follower_id, followee_id
        );
        Ok(true)
    }

    async fn is_following(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id.as_str())
        .bind(followee_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_graph_stats(&self, user_id: &UserId) -> Result<Option<GraphStats>> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT follower_count, following_count FROM users WHERE id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(followers, following)| GraphStats {
            user_id: user_id.clone(),
            followers_count: followers.max(0) as u64,
            following_count: following.max(0) as u64,
        }))
    }

    async fn get_followers(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<UserId>, u64, bool)> {
        self.page(
            "SELECT follower_id FROM follows
             WHERE followee_id = $1
             ORDER BY seq ASC
             LIMIT $2 OFFSET $3",
            "SELECT follower_count FROM users WHERE id = $1",
            user_id,
            limit,
            offset,
        )
        .await
    }

    async fn get_following(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<UserId>, u64, bool)> {
        self.page(
            "SELECT followee_id FROM follows
             WHERE follower_id = $1
             ORDER BY seq ASC
             LIMIT $2 OFFSET $3",
            "SELECT following_count FROM users WHERE id = $1",
            user_id,
            limit,
            offset,
        )
        .await
    }

    async fn get_friends_of_friends(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT f2.followee_id
            FROM follows f1
            JOIN follows f2 ON f2.follower_id = f1.followee_id
            WHERE f1.follower_id = $1
              AND f2.followee_id <> $1
              AND NOT EXISTS (
                  SELECT 1 FROM follows direct
                  WHERE direct.follower_id = $1 AND direct.followee_id = f2.followee_id
              )
            ORDER BY f2.followee_id
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| UserId::from(id)).collect())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Ensure the graph tables exist.
///
/// Created lazily so a fresh database works without a separate migration step.
pub async fn ensure_graph_tables(pool: &PgPool) -> Result<()> {
    info!("Ensuring PostgreSQL graph tables exist");

    for statement in [
        USERS_TABLE,
        FOLLOWS_TABLE,
        FOLLOWS_FOLLOWEE_INDEX,
        FOLLOWS_FOLLOWER_INDEX,
    ] {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

const USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    profile JSONB NOT NULL DEFAULT '{}'::jsonb,
    follower_count BIGINT NOT NULL DEFAULT 0,
    following_count BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT users_counts_non_negative CHECK (follower_count >= 0 AND following_count >= 0)
)
"#;

const FOLLOWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS follows (
    follower_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    followee_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    seq BIGSERIAL NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (follower_id, followee_id),
    CONSTRAINT follows_no_self CHECK (follower_id <> followee_id)
)
"#;

const FOLLOWS_FOLLOWEE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_follows_followee_seq ON follows (followee_id, seq)";

const FOLLOWS_FOLLOWER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_follows_follower_seq ON follows (follower_id, seq)";
