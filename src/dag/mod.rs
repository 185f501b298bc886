// src/dag/mod.rs

//! Task planning and scheduling.
//!
//! - [`plan`] turns selected targets into a static, ordered plan.
//! - [`scheduler`] is the per-build state machine that decides which tasks
//!   are eligible, cascades failures and appends finalizers.
//! - [`task_info`] provides task statuses and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] implements the status transitions.

pub(crate) mod cycles;
pub mod plan;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use plan::{EdgeKind, ExecutionPlan, PlannedTask};
pub use scheduler::{Scheduler, SchedulerOptions, default_workers};
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, SkipReason, TaskInfo, TaskStatus};
