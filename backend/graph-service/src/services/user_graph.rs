use crate::config::GraphConfig;
use crate::domain::edge::{Edge, GraphStats};
use crate::domain::user::User;
use crate::repository::{GraphRepositoryTrait, MemoryGraphRepository};
use crate::services::friends_of_friends::{AggregateStrategy, FriendsOfFriends, IterativeStrategy};
use social_common::{Payload, Result, SocialError, UserId};
use std::sync::Arc;
use tracing::{debug, info};

/// User graph operations on top of a `GraphRepositoryTrait` backend.
///
/// Validation (self-follow, missing users) happens here; counter
/// bookkeeping is the repository's job.
#[derive(Clone)]
pub struct UserGraphService {
    repo: Arc<dyn GraphRepositoryTrait>,
    config: GraphConfig,
}

impl UserGraphService {
    pub fn new(repo: Arc<dyn GraphRepositoryTrait>, config: GraphConfig) -> Self {
        Self { repo, config }
    }

    /// Service over a fresh in-memory graph
    pub fn in_memory(config: GraphConfig) -> Self {
        Self::new(Arc::new(MemoryGraphRepository::new()), config)
    }

    pub fn repository(&self) -> Arc<dyn GraphRepositoryTrait> {
        Arc::clone(&self.repo)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    pub async fn create_user(&self, user_id: UserId, profile: Payload) -> Result<User> {
        let user = User::new(user_id, profile);
        self.repo.create_user(&user).await?;
        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<User> {
        self.repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| SocialError::UserNotFound(user_id.clone()))
    }

    /// Remove a user and all incident edges
    pub async fn remove_user(&self, user_id: &UserId) -> Result<()> {
        if !self.repo.delete_user(user_id).await? {
            return Err(SocialError::UserNotFound(user_id.clone()));
        }
        info!(user_id = %user_id, "User removed");
        Ok(())
    }

    pub async fn user_exists(&self, user_id: &UserId) -> Result<bool> {
        self.repo.user_exists(user_id).await
    }

    /// `UserNotFound` unless the user exists
    pub async fn validate_user(&self, user_id: &UserId) -> Result<()> {
        if self.repo.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(SocialError::UserNotFound(user_id.clone()))
        }
    }

    // ------------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------------

    /// Follow `followee_id`. Returns false when the edge already existed.
    pub async fn follow(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool> {
        let edge = Edge::new_follow(follower_id.clone(), followee_id.clone())?;
        self.validate_user(follower_id).await?;
        self.validate_user(followee_id).await?;

        let created = self.repo.create_follow(&edge).await?;
        if created {
            info!(follower = %follower_id, followee = %followee_id, "Follow created");
        } else {
            debug!(follower = %follower_id, followee = %followee_id, "Follow already exists");
        }
        Ok(created)
    }

    /// Unfollow `followee_id`. Returns false when there was no edge.
    pub async fn unfollow(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool> {
        self.validate_user(follower_id).await?;
        self.validate_user(followee_id).await?;

        let removed = self.repo.delete_follow(follower_id, followee_id).await?;
        if removed {
            info!(follower = %follower_id, followee = %followee_id, "Follow removed");
        } else {
            debug!(follower = %follower_id, followee = %followee_id, "Unfollow without edge");
        }
        Ok(removed)
    }

    pub async fn is_following(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool> {
        self.repo.is_following(follower_id, followee_id).await
    }

    // ------------------------------------------------------------------------
    // Counters and listings
    // ------------------------------------------------------------------------

    pub async fn get_graph_stats(&self, user_id: &UserId) -> Result<GraphStats> {
        self.repo
            .get_graph_stats(user_id)
            .await?
            .ok_or_else(|| SocialError::UserNotFound(user_id.clone()))
    }

    pub async fn get_follower_count(&self, user_id: &UserId) -> Result<u64> {
        Ok(self.get_graph_stats(user_id).await?.followers_count)
    }

    pub async fn get_following_count(&self, user_id: &UserId) -> Result<u64> {
        Ok(self.get_graph_stats(user_id).await?.following_count)
    }

    /// Up to `limit` followers, hydrated, in edge-creation order
    pub async fn get_followers(&self, user_id: &UserId, limit: usize) -> Result<Vec<User>> {
        self.validate_user(user_id).await?;
        let limit = limit.min(self.config.max_page_size);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let (ids, _, _) = self.repo.get_followers(user_id, limit, 0).await?;
        self.repo.get_users(&ids).await
    }

    /// Up to `limit` followees, hydrated, in edge-creation order
    pub async fn get_following(&self, user_id: &UserId, limit: usize) -> Result<Vec<User>> {
        self.validate_user(user_id).await?;
        let limit = limit.min(self.config.max_page_size);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let (ids, _, _) = self.repo.get_following(user_id, limit, 0).await?;
        self.repo.get_users(&ids).await
    }

    /// Complete follower id snapshot, used by fan-out
    pub async fn get_all_follower_ids(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        self.validate_user(user_id).await?;
        self.repo.get_all_followers(user_id).await
    }

    // ------------------------------------------------------------------------
    // Friends of friends
    // ------------------------------------------------------------------------

    pub async fn get_friends_of_friends_agg(&self, user_id: &UserId) -> Result<Vec<User>> {
        self.friends_of_friends(user_id, &AggregateStrategy).await
    }

    pub async fn get_friends_of_friends_query(&self, user_id: &UserId) -> Result<Vec<User>> {
        let strategy = IterativeStrategy::new(self.config.fof_concurrency);
        self.friends_of_friends(user_id, &strategy).await
    }

    /// Friends of friends via `strategy`, hydrated and sorted by id
    pub async fn friends_of_friends(
        &self,
        user_id: &UserId,
        strategy: &dyn FriendsOfFriends,
    ) -> Result<Vec<User>> {
        self.validate_user(user_id).await?;

        let ids: Vec<UserId> = strategy
            .resolve(self.repo.as_ref(), user_id)
            .await?
            .into_iter()
            .collect();
        debug!(
            user_id = %user_id,
            strategy = strategy.name(),
            count = ids.len(),
            "Friends of friends resolved"
        );

        // Ids come out of a BTreeSet, and get_users keeps input order
        self.repo.get_users(&ids).await
    }
}
