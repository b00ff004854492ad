//! Domain types for plan execution
//!
//! Passive data: Task, TaskGroup, PlanSpecification, PlanDocument.
//! Behavior lives in the parser, scheduler and writer modules.

mod group;
mod plan;
mod status;
mod task;

pub use group::TaskGroup;
pub use plan::{PlanDocument, PlanSpecification};
pub use status::{PlanStatus, TaskStatus};
pub use task::Task;
