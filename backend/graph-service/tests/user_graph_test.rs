//! Integration Tests: User Graph
//!
//! Coverage:
//! - Counters always equal the number of live edges after concurrent churn
//! - Removing a user repairs every neighbour's counters
//! - Aggregate and iterative friend-of-friend strategies agree

use graph_service::{
    AggregateStrategy, FriendsOfFriends, GraphConfig, IterativeStrategy, UserGraphService,
};
use social_common::{Payload, UserId};
use std::collections::BTreeSet;

fn uid(id: &str) -> UserId {
    UserId::from(id)
}

async fn service_with_users(n: usize) -> (UserGraphService, Vec<UserId>) {
    let service = UserGraphService::in_memory(GraphConfig::default());
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let id = UserId::new(format!("user-{:02}", i));
        service.create_user(id.clone(), Payload::empty()).await.unwrap();
        ids.push(id);
    }
    (service, ids)
}

/// Every counter matches the edge lists it summarises
async fn assert_counters_consistent(service: &UserGraphService, ids: &[UserId]) {
    let repo = service.repository();
    let mut total_in = 0u64;
    let mut total_out = 0u64;

    for id in ids {
        let stats = service.get_graph_stats(id).await.unwrap();
        let followers = repo.get_all_followers(id).await.unwrap();
        let following = repo.get_all_following(id).await.unwrap();

        assert_eq!(stats.followers_count, followers.len() as u64, "followers of {}", id);
        assert_eq!(stats.following_count, following.len() as u64, "following of {}", id);

        total_in += stats.followers_count;
        total_out += stats.following_count;
    }
    assert_eq!(total_in, total_out);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_follow_unfollow_keeps_counters_exact() {
    let (service, ids) = service_with_users(8).await;

    let mut handles = Vec::new();
    for round in 0..4usize {
        for (i, a) in ids.iter().enumerate() {
            for (j, b) in ids.iter().enumerate() {
                if i == j {
                    continue;
                }
                let service = service.clone();
                let (a, b) = (a.clone(), b.clone());
                handles.push(tokio::spawn(async move {
                    if (i + j + round) % 3 == 0 {
                        service.unfollow(&a, &b).await.unwrap();
                    } else {
                        service.follow(&a, &b).await.unwrap();
                    }
                }));
            }
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_counters_consistent(&service, &ids).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_remove_user_during_churn() {
    let (service, ids) = service_with_users(6).await;
    for a in &ids {
        for b in &ids {
            if a != b {
                service.follow(a, b).await.unwrap();
            }
        }
    }

    let victim = ids[0].clone();
    let mut handles = Vec::new();
    for other in ids.iter().skip(1) {
        let service = service.clone();
        let (victim, other) = (victim.clone(), other.clone());
        handles.push(tokio::spawn(async move {
            // Either order is fine; errors only mean the victim is already gone
            let _ = service.unfollow(&other, &victim).await;
            let _ = service.follow(&other, &victim).await;
        }));
    }
    service.remove_user(&victim).await.unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    let survivors = &ids[1..];
    assert!(!service.user_exists(&victim).await.unwrap());
    for id in survivors {
        let stats = service.get_graph_stats(id).await.unwrap();
        assert_eq!(stats.followers_count, (survivors.len() - 1) as u64);
        assert_eq!(stats.following_count, (survivors.len() - 1) as u64);
    }
    assert_counters_consistent(&service, survivors).await;
}

#[tokio::test]
async fn test_recreated_user_has_no_history() {
    let (service, ids) = service_with_users(3).await;
    service.follow(&ids[1], &ids[0]).await.unwrap();
    service.follow(&ids[0], &ids[2]).await.unwrap();

    service.remove_user(&ids[0]).await.unwrap();
    service
        .create_user(ids[0].clone(), Payload::empty())
        .await
        .unwrap();

    assert_eq!(service.get_follower_count(&ids[0]).await.unwrap(), 0);
    assert_eq!(service.get_following_count(&ids[0]).await.unwrap(), 0);
    assert!(!service.is_following(&ids[1], &ids[0]).await.unwrap());
    assert_eq!(service.get_follower_count(&ids[2]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_strategies_agree_on_layered_graph() {
    let (service, ids) = service_with_users(12).await;

    // user i follows i+1, i+2 and (i*5)%12, which gives overlapping second hops
    for i in 0..ids.len() {
        for j in [(i + 1) % 12, (i + 2) % 12, (i * 5) % 12] {
            if i != j {
                service.follow(&ids[i], &ids[j]).await.unwrap();
            }
        }
    }

    let repo = service.repository();
    for id in &ids {
        let agg = AggregateStrategy.resolve(repo.as_ref(), id).await.unwrap();
        let iter = IterativeStrategy::new(3)
            .resolve(repo.as_ref(), id)
            .await
            .unwrap();
        assert_eq!(agg, iter, "strategies disagree for {}", id);

        let direct: BTreeSet<UserId> = repo.get_all_following(id).await.unwrap().into_iter().collect();
        assert!(!agg.contains(id));
        assert!(agg.is_disjoint(&direct));
    }
}

#[tokio::test]
async fn test_friends_of_friends_after_unfollow() {
    let (service, _) = service_with_users(0).await;
    for id in ["a", "b", "c", "d"] {
        service.create_user(uid(id), Payload::empty()).await.unwrap();
    }
    service.follow(&uid("a"), &uid("b")).await.unwrap();
    service.follow(&uid("b"), &uid("c")).await.unwrap();
    service.follow(&uid("b"), &uid("d")).await.unwrap();
    service.follow(&uid("a"), &uid("d")).await.unwrap();

    let fof = service.get_friends_of_friends_query(&uid("a")).await.unwrap();
    assert_eq!(fof.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), vec!["c"]);

    service.unfollow(&uid("a"), &uid("d")).await.unwrap();
    let fof = service.get_friends_of_friends_agg(&uid("a")).await.unwrap();
    assert_eq!(
        fof.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(),
        vec!["c", "d"]
    );
}
