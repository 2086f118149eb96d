use crate::domain::edge::{Edge, GraphStats};
use crate::domain::user::User;
use social_common::{Result, UserId};

/// Storage contract for the user graph.
///
/// Implementations own users, follow edges and the denormalised counters.
/// Every edge insert/delete must update both endpoint counters in the same
/// indivisible unit as the edge change itself.
#[async_trait::async_trait]
pub trait GraphRepositoryTrait: Send + Sync {
    /// Insert a user with zero counters; `DuplicateUser` if the id is taken
    async fn create_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Batch lookup preserving input order; unknown ids are dropped
    async fn get_users(&self, user_ids: &[UserId]) -> Result<Vec<User>>;

    async fn user_exists(&self, user_id: &UserId) -> Result<bool>;

    /// Delete a user and every incident edge, correcting the counters of the
    /// other endpoints. Returns false if the user did not exist.
    async fn delete_user(&self, user_id: &UserId) -> Result<bool>;

    /// Create a follow edge.
    /// Returns true if a new edge was inserted, false if it already existed.
    /// Fails with `UserNotFound` if either endpoint is missing.
    async fn create_follow(&self, edge: &Edge) -> Result<bool>;

    /// Delete a follow edge; returns true if one was removed
    async fn delete_follow(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool>;

    async fn is_following(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool>;

    /// Cached counters, `None` for unknown users
    async fn get_graph_stats(&self, user_id: &UserId) -> Result<Option<GraphStats>>;

    /// Followers of a user in edge-creation order
    /// Returns: (follower_ids, total_count, has_more)
    async fn get_followers(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<UserId>, u64, bool)>;

    /// Users a user follows in edge-creation order
    /// Returns: (following_ids, total_count, has_more)
    async fn get_following(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<UserId>, u64, bool)>;

    /// Full follower snapshot
    async fn get_all_followers(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        let (ids, _, _) = self.get_followers(user_id, usize::MAX, 0).await?;
        Ok(ids)
    }

    /// Full following snapshot
    async fn get_all_following(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        let (ids, _, _) = self.get_following(user_id, usize::MAX, 0).await?;
        Ok(ids)
    }

    /// Aggregate friend-of-friend traversal pushed down to the store.
    ///
    /// Returns every user exactly two follow hops from `user_id`, deduplicated,
    /// excluding `user_id` itself and everyone it follows directly.
    async fn get_friends_of_friends(&self, user_id: &UserId) -> Result<Vec<UserId>>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
