//! User graph: users, directed follow edges, denormalised follower/following
//! counters, and two friend-of-friend resolution strategies.

pub mod config;
pub mod domain;
pub mod repository;
pub mod services;

pub use config::GraphConfig;
pub use domain::edge::{Edge, GraphStats};
pub use domain::user::User;
pub use repository::{GraphRepositoryTrait, MemoryGraphRepository, PostgresGraphRepository};
pub use services::{AggregateStrategy, FriendsOfFriends, IterativeStrategy, UserGraphService};
