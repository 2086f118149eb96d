//! Friend-of-friend resolution.
//!
//! Both strategies answer the same question: every user exactly two follow
//! hops away, minus the user and everyone they already follow. They differ
//! only in where the work happens.

use crate::repository::GraphRepositoryTrait;
use futures::stream::{self, StreamExt, TryStreamExt};
use social_common::{Result, UserId};
use std::collections::BTreeSet;
use tracing::debug;

#[async_trait::async_trait]
pub trait FriendsOfFriends: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(
        &self,
        repo: &dyn GraphRepositoryTrait,
        user_id: &UserId,
    ) -> Result<BTreeSet<UserId>>;
}

/// Single store-side traversal (`get_friends_of_friends`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateStrategy;

#[async_trait::async_trait]
impl FriendsOfFriends for AggregateStrategy {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    async fn resolve(
        &self,
        repo: &dyn GraphRepositoryTrait,
        user_id: &UserId,
    ) -> Result<BTreeSet<UserId>> {
        let ids = repo.get_friends_of_friends(user_id).await?;
        Ok(ids.into_iter().collect())
    }
}

/// Client-side traversal: one following lookup per direct followee,
/// at most `max_concurrency` in flight.
#[derive(Debug, Clone, Copy)]
pub struct IterativeStrategy {
    max_concurrency: usize,
}

impl IterativeStrategy {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

#[async_trait::async_trait]
impl FriendsOfFriends for IterativeStrategy {
    fn name(&self) -> &'static str {
        "iterative"
    }

    async fn resolve(
        &self,
        repo: &dyn GraphRepositoryTrait,
        user_id: &UserId,
    ) -> Result<BTreeSet<UserId>> {
        let direct = repo.get_all_following(user_id).await?;

        let second_hop: Vec<Vec<UserId>> = stream::iter(direct.clone())
            .map(|followee| async move { repo.get_all_following(&followee).await })
            .buffer_unordered(self.max_concurrency)
            .try_collect()
            .await?;

        let direct: BTreeSet<&UserId> = direct.iter().collect();
        let result: BTreeSet<UserId> = second_hop
            .into_iter()
            .flatten()
            .filter(|candidate| candidate != user_id && !direct.contains(candidate))
            .collect();

        debug!(
            user_id = %user_id,
            direct = direct.len(),
            found = result.len(),
            "Resolved friends of friends iteratively"
        );
        Ok(result)
    }
}
