pub mod job;
pub mod scheduler;

pub use job::{random_rows, Job, Work};
pub use scheduler::Scheduler;
