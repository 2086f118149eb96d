pub mod fanout;
pub mod feed;

pub use fanout::{FanoutDispatcher, FanoutReport, FanoutWorker};
pub use feed::FeedService;
