mod memory_repository;
mod postgres_repository;
mod r#trait;

pub use memory_repository::MemoryGraphRepository;
pub use postgres_repository::{ensure_graph_tables, PostgresGraphRepository};
pub use r#trait::GraphRepositoryTrait;
