//! Generation task model and in-memory state store.

pub mod store;
pub mod types;

pub use store::TaskStore;
pub use types::{GenerationTask, MediaParams, MediaType, TaskEvent, TaskPatch, TaskStatus};
