pub mod memory;
pub mod models;
pub mod repository;

pub use memory::InMemoryTaskRepository;
pub use repository::ScheduledTaskRepositoryImpl;
