//! Dependency-ordered group scheduling

mod core;
mod deps;
mod report;

pub use self::core::{GroupOutcome, PlanExecutor, execute_group};
pub use deps::{ready_groups, resolve_dependencies, validate_dependency_graph};
pub use report::{RunReport, summary};
