pub mod friends_of_friends;
pub mod user_graph;

pub use friends_of_friends::{AggregateStrategy, FriendsOfFriends, IterativeStrategy};
pub use user_graph::UserGraphService;
