pub mod entities;
pub mod repository;
pub mod value_objects;

pub use entities::{ScheduledTask, TaskOutcome, TaskStatus};
pub use repository::ScheduledTaskRepository;
pub use value_objects::TaskStatusDb;
