use super::GraphRepositoryTrait;
use crate::domain::edge::{Edge, GraphStats};
use crate::domain::user::User;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use social_common::{Payload, Result, SocialError, UserId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::debug;

/// One side of a follow edge as stored in an adjacency list.
///
/// `peer_incarnation` pins the edge to one lifetime of the peer, so an edge
/// left behind by a removed user never matches a recreated user with the
/// same id.
#[derive(Debug, Clone, Copy)]
struct EdgeRef {
    seq: u64,
    peer_incarnation: u64,
}

/// Adjacency list ordered by edge creation
#[derive(Debug, Default)]
struct EdgeList {
    by_peer: HashMap<UserId, EdgeRef>,
    by_seq: BTreeMap<u64, UserId>,
}

impl EdgeList {
    fn get(&self, peer: &UserId) -> Option<EdgeRef> {
        self.by_peer.get(peer).copied()
    }

    fn insert(&mut self, peer: UserId, edge: EdgeRef) {
        self.by_seq.insert(edge.seq, peer.clone());
        self.by_peer.insert(peer, edge);
    }

    /// Remove the edge to `peer` only if it belongs to that peer incarnation
    fn remove(&mut self, peer: &UserId, peer_incarnation: u64) -> bool {
        match self.by_peer.get(peer) {
            Some(edge) if edge.peer_incarnation == peer_incarnation => {
                let seq = edge.seq;
                self.by_peer.remove(peer);
                self.by_seq.remove(&seq);
                true
            }
            _ => false,
        }
    }

    fn page(&self, limit: usize, offset: usize) -> Vec<UserId> {
        self.by_seq.values().skip(offset).take(limit).cloned().collect()
    }

    fn len(&self) -> usize {
        self.by_peer.len()
    }

    fn drain(&mut self) -> Vec<(UserId, EdgeRef)> {
        self.by_seq.clear();
        self.by_peer.drain().collect()
    }
}

#[derive(Debug, Default)]
struct Adjacency {
    removed: bool,
    followers: EdgeList,
    following: EdgeList,
}

#[derive(Debug)]
struct UserNode {
    id: UserId,
    profile: Payload,
    created_at: DateTime<Utc>,
    incarnation: u64,
    follower_count: AtomicU64,
    following_count: AtomicU64,
    adjacency: RwLock<Adjacency>,
}

impl UserNode {
    fn snapshot(&self) -> User {
        User {
            id: self.id.clone(),
            profile: self.profile.clone(),
            follower_count: self.follower_count.load(Ordering::Acquire),
            following_count: self.following_count.load(Ordering::Acquire),
            created_at: self.created_at,
        }
    }

    fn stats(&self) -> GraphStats {
        GraphStats {
            user_id: self.id.clone(),
            followers_count: self.follower_count.load(Ordering::Acquire),
            following_count: self.following_count.load(Ordering::Acquire),
        }
    }
}

/// In-process user graph.
///
/// Each user node carries its own adjacency lock. Edge mutations take both
/// endpoint locks (ordered by user id) and update edge lists and counters
/// before releasing either, so counters never disagree with the edges once a
/// mutation returns. Counter reads are lock-free atomics.
#[derive(Default)]
pub struct MemoryGraphRepository {
    nodes: DashMap<UserId, Arc<UserNode>>,
    incarnations: AtomicU64,
    edge_seq: AtomicU64,
}

impl MemoryGraphRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, user_id: &UserId) -> Option<Arc<UserNode>> {
        self.nodes.get(user_id).map(|entry| Arc::clone(entry.value()))
    }

    fn require(&self, user_id: &UserId) -> Result<Arc<UserNode>> {
        self.node(user_id)
            .ok_or_else(|| SocialError::UserNotFound(user_id.clone()))
    }
}

/// Write-lock two distinct nodes in id order, returned as (a, b)
async fn lock_pair<'a>(
    a: &'a UserNode,
    b: &'a UserNode,
) -> (
    RwLockWriteGuard<'a, Adjacency>,
    RwLockWriteGuard<'a, Adjacency>,
) {
    if a.id < b.id {
        let ga = a.adjacency.write().await;
        let gb = b.adjacency.write().await;
        (ga, gb)
    } else {
        let gb = b.adjacency.write().await;
        let ga = a.adjacency.write().await;
        (ga, gb)
    }
}

/// Drop an entry for `peer` that belongs to an earlier incarnation.
/// Whoever removes an entry also decrements the counter it was counted in.
fn purge_stale(list: &mut EdgeList, peer: &UserId, live_incarnation: u64, counter: &AtomicU64) {
    if let Some(edge) = list.get(peer) {
        if edge.peer_incarnation != live_incarnation && list.remove(peer, edge.peer_incarnation) {
            counter.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

#[async_trait::async_trait]
impl GraphRepositoryTrait for MemoryGraphRepository {
    async fn create_user(&self, user: &User) -> Result<()> {
        match self.nodes.entry(user.id.clone()) {
            Entry::Occupied(_) => Err(SocialError::DuplicateUser(user.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(UserNode {
                    id: user.id.clone(),
                    profile: user.profile.clone(),
                    created_at: user.created_at,
                    incarnation: self.incarnations.fetch_add(1, Ordering::AcqRel),
                    follower_count: AtomicU64::new(0),
                    following_count: AtomicU64::new(0),
                    adjacency: RwLock::new(Adjacency::default()),
                }));
                debug!("Created user node: {}", user.id);
                Ok(())
            }
        }
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.node(user_id).map(|node| node.snapshot()))
    }

    async fn get_users(&self, user_ids: &[UserId]) -> Result<Vec<User>> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.node(id))
            .map(|node| node.snapshot())
            .collect())
    }

    async fn user_exists(&self, user_id: &UserId) -> Result<bool> {
        Ok(self.nodes.contains_key(user_id))
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<bool> {
        let Some((_, node)) = self.nodes.remove(user_id) else {
            return Ok(false);
        };

        // Past this point concurrent follows against this node observe
        // `removed` and fail; edges committed before it are drained here.
        let (followers, following) = {
            let mut adjacency = node.adjacency.write().await;
            adjacency.removed = true;
            (adjacency.followers.drain(), adjacency.following.drain())
        };

        let mut detached = 0usize;

        for (peer_id, edge) in followers {
            let Some(peer) = self.node(&peer_id) else { continue };
            if peer.incarnation != edge.peer_incarnation {
                continue;
            }
            let mut adjacency = peer.adjacency.write().await;
            if adjacency.following.remove(user_id, node.incarnation) {
                peer.following_count.fetch_sub(1, Ordering::AcqRel);
                detached += 1;
            }
        }

        for (peer_id, edge) in following {
            let Some(peer) = self.node(&peer_id) else { continue };
            if peer.incarnation != edge.peer_incarnation {
                continue;
            }
            let mut adjacency = peer.adjacency.write().await;
            if adjacency.followers.remove(user_id, node.incarnation) {
                peer.follower_count.fetch_sub(1, Ordering::AcqRel);
                detached += 1;
            }
        }

        debug!("Deleted user {} and detached {} edges", user_id, detached);
        Ok(true)
    }

    async fn create_follow(&self, edge: &Edge) -> Result<bool> {
        if edge.follower_id == edge.followee_id {
            return Err(SocialError::SelfFollow(edge.follower_id.clone()));
        }

        let follower = self.require(&edge.follower_id)?;
        let followee = self.require(&edge.followee_id)?;

        let (mut from, mut to) = lock_pair(&follower, &followee).await;
        if from.removed {
            return Err(SocialError::UserNotFound(edge.follower_id.clone()));
        }
        if to.removed {
            return Err(SocialError::UserNotFound(edge.followee_id.clone()));
        }

        purge_stale(
            &mut from.following,
            &followee.id,
            followee.incarnation,
            &follower.following_count,
        );
        purge_stale(
            &mut to.followers,
            &follower.id,
            follower.incarnation,
            &followee.follower_count,
        );

        if from.following.get(&followee.id).is_some() {
            debug!(
                "FOLLOWS already present: {} -> {}",
                edge.follower_id, edge.followee_id
            );
            return Ok(false);
        }

        let seq = self.edge_seq.fetch_add(1, Ordering::AcqRel);
        from.following.insert(
            followee.id.clone(),
            EdgeRef {
                seq,
                peer_incarnation: followee.incarnation,
            },
        );
        to.followers.insert(
            follower.id.clone(),
            EdgeRef {
                seq,
                peer_incarnation: follower.incarnation,
            },
        );
        follower.following_count.fetch_add(1, Ordering::AcqRel);
        followee.follower_count.fetch_add(1, Ordering::AcqRel);

        debug!("Created FOLLOWS: {} -> {}", edge.follower_id, edge.followee_id);
        Ok(true)
    }

    async fn delete_follow(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool> {
        if follower_id == followee_id {
            return Ok(false);
        }
        let (Some(follower), Some(followee)) = (self.node(follower_id), self.node(followee_id))
        else {
            return Ok(false);
        };

        let (mut from, mut to) = lock_pair(&follower, &followee).await;
        if from.removed || to.removed {
            return Ok(false);
        }

        if !from.following.remove(followee_id, followee.incarnation) {
            return Ok(false);
        }
        to.followers.remove(follower_id, follower.incarnation);
        follower.following_count.fetch_sub(1, Ordering::AcqRel);
        followee.follower_count.fetch_sub(1, Ordering::AcqRel);

        debug!("Deleted FOLLOWS: {} -> {}", follower_id, followee_id);
        Ok(true)
    }

    async fn is_following(&self, follower_id: &UserId, followee_id: &UserId) -> Result<bool> {
        let (Some(follower), Some(followee)) = (self.node(follower_id), self.node(followee_id))
        else {
            return Ok(false);
        };
        let adjacency = follower.adjacency.read().await;
        Ok(adjacency
            .following
            .get(followee_id)
            .map(|edge| edge.peer_incarnation == followee.incarnation)
            .unwrap_or(false))
    }

    async fn get_graph_stats(&self, user_id: &UserId) -> Result<Option<GraphStats>> {
        Ok(self.node(user_id).map(|node| node.stats()))
    }

    async fn get_followers(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<UserId>, u64, bool)> {
        let Some(node) = self.node(user_id) else {
            return Ok((Vec::new(), 0, false));
        };
        let adjacency = node.adjacency.read().await;
        let total = adjacency.followers.len();
        let ids = adjacency.followers.page(limit, offset);
        let has_more = offset.saturating_add(ids.len()) < total;
        Ok((ids, total as u64, has_more))
    }

    async fn get_following(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<UserId>, u64, bool)> {
        let Some(node) = self.node(user_id) else {
            return Ok((Vec::new(), 0, false));
        };
        let adjacency = node.adjacency.read().await;
        let total = adjacency.following.len();
        let ids = adjacency.following.page(limit, offset);
        let has_more = offset.saturating_add(ids.len()) < total;
        Ok((ids, total as u64, has_more))
    }

    async fn get_friends_of_friends(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        let Some(node) = self.node(user_id) else {
            return Ok(Vec::new());
        };
        let direct: Vec<UserId> = {
            let adjacency = node.adjacency.read().await;
            adjacency.following.by_peer.keys().cloned().collect()
        };
        let excluded: HashSet<&UserId> = direct.iter().chain(std::iter::once(user_id)).collect();

        let mut reachable = BTreeSet::new();
        for friend_id in &direct {
            let Some(friend) = self.node(friend_id) else { continue };
            let adjacency = friend.adjacency.read().await;
            for candidate in adjacency.following.by_peer.keys() {
                if !excluded.contains(candidate) {
                    reachable.insert(candidate.clone());
                }
            }
        }

        Ok(reachable.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(id: &str) -> UserId {
        UserId::from(id)
    }

    async fn repo_with(users: &[&str]) -> MemoryGraphRepository {
        let repo = MemoryGraphRepository::new();
        for id in users {
            repo.create_user(&User::new(uid(id), Payload::empty()))
                .await
                .unwrap();
        }
        repo
    }

    async fn follow(repo: &MemoryGraphRepository, a: &str, b: &str) -> bool {
        repo.create_follow(&Edge::new_follow(uid(a), uid(b)).unwrap())
            .await
            .unwrap()
    }

    async fn counts(repo: &MemoryGraphRepository, id: &str) -> (u64, u64) {
        let stats = repo.get_graph_stats(&uid(id)).await.unwrap().unwrap();
        (stats.followers_count, stats.following_count)
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let repo = repo_with(&["alice"]).await;
        let err = repo
            .create_user(&User::new(uid("alice"), Payload::empty()))
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::DuplicateUser(_)));
    }

    #[tokio::test]
    async fn test_follow_updates_both_counters_once() {
        let repo = repo_with(&["alice", "bob"]).await;

        assert!(follow(&repo, "alice", "bob").await);
        assert!(!follow(&repo, "alice", "bob").await);

        assert_eq!(counts(&repo, "alice").await, (0, 1));
        assert_eq!(counts(&repo, "bob").await, (1, 0));
        assert!(repo.is_following(&uid("alice"), &uid("bob")).await.unwrap());
        assert!(!repo.is_following(&uid("bob"), &uid("alice")).await.unwrap());
    }

    #[tokio::test]
    async fn test_follow_missing_endpoint() {
        let repo = repo_with(&["alice"]).await;
        let edge = Edge::new_follow(uid("alice"), uid("ghost")).unwrap();
        let err = repo.create_follow(&edge).await.unwrap_err();
        assert!(matches!(err, SocialError::UserNotFound(id) if id.as_str() == "ghost"));
        assert_eq!(counts(&repo, "alice").await, (0, 0));
    }

    #[tokio::test]
    async fn test_unfollow_missing_edge_is_noop() {
        let repo = repo_with(&["alice", "bob"]).await;
        assert!(!repo.delete_follow(&uid("alice"), &uid("bob")).await.unwrap());

        follow(&repo, "alice", "bob").await;
        assert!(repo.delete_follow(&uid("alice"), &uid("bob")).await.unwrap());
        assert!(!repo.delete_follow(&uid("alice"), &uid("bob")).await.unwrap());
        assert_eq!(counts(&repo, "bob").await, (0, 0));
    }

    #[tokio::test]
    async fn test_pages_follow_edge_creation_order() {
        let repo = repo_with(&["hub", "c", "a", "b"]).await;
        follow(&repo, "c", "hub").await;
        follow(&repo, "a", "hub").await;
        follow(&repo, "b", "hub").await;

        let (ids, total, has_more) = repo.get_followers(&uid("hub"), 2, 0).await.unwrap();
        assert_eq!(ids, vec![uid("c"), uid("a")]);
        assert_eq!(total, 3);
        assert!(has_more);

        let (ids, _, has_more) = repo.get_followers(&uid("hub"), 2, 2).await.unwrap();
        assert_eq!(ids, vec![uid("b")]);
        assert!(!has_more);
    }

    #[tokio::test]
    async fn test_delete_user_detaches_edges_and_corrects_counters() {
        let repo = repo_with(&["alice", "bob", "carol"]).await;
        follow(&repo, "alice", "bob").await;
        follow(&repo, "bob", "carol").await;
        follow(&repo, "carol", "bob").await;

        assert!(repo.delete_user(&uid("bob")).await.unwrap());
        assert!(!repo.delete_user(&uid("bob")).await.unwrap());

        assert_eq!(counts(&repo, "alice").await, (0, 0));
        assert_eq!(counts(&repo, "carol").await, (0, 0));
        assert!(repo.get_all_following(&uid("alice")).await.unwrap().is_empty());
        assert!(repo.get_all_followers(&uid("carol")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recreated_user_starts_without_edges() {
        let repo = repo_with(&["alice", "bob"]).await;
        follow(&repo, "alice", "bob").await;

        repo.delete_user(&uid("bob")).await.unwrap();
        repo.create_user(&User::new(uid("bob"), Payload::empty()))
            .await
            .unwrap();

        assert_eq!(counts(&repo, "bob").await, (0, 0));
        assert!(!repo.is_following(&uid("alice"), &uid("bob")).await.unwrap());
        assert!(follow(&repo, "alice", "bob").await);
        assert_eq!(counts(&repo, "alice").await, (0, 1));
        assert_eq!(counts(&repo, "bob").await, (1, 0));
    }

    #[tokio::test]
    async fn test_friends_of_friends_push_down() {
        let repo = repo_with(&["alice", "bob", "carol", "dave", "erin"]).await;
        follow(&repo, "alice", "bob").await;
        follow(&repo, "alice", "dave").await;
        follow(&repo, "bob", "carol").await;
        follow(&repo, "bob", "alice").await;
        follow(&repo, "bob", "dave").await;
        follow(&repo, "dave", "carol").await;
        follow(&repo, "dave", "erin").await;

        let fof = repo.get_friends_of_friends(&uid("alice")).await.unwrap();
        assert_eq!(fof, vec![uid("carol"), uid("erin")]);
        assert!(repo
            .get_friends_of_friends(&uid("ghost"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_follow_same_pair_counts_once() {
        let repo = Arc::new(repo_with(&["alice", "bob"]).await);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    let edge = Edge::new_follow(uid("alice"), uid("bob")).unwrap();
                    repo.create_follow(&edge).await.unwrap()
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(counts(&repo, "alice").await, (0, 1));
        assert_eq!(counts(&repo, "bob").await, (1, 0));
    }
}
