pub mod async_task;
mod observability;
pub use observability::*;
