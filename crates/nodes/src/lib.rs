//! Issue bot orchestration.
//!
//! This crate sequences calls between the domain rules in [`pipeline`] and the
//! port traits implemented by the infrastructure crates. It contains the three
//! command handlers and the dispatcher that drives them.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`prd`] | PRD pipeline (idempotency → draft → language → translation) |
//! | [`subtasks`] | Sub-task checklist from the latest PRD |
//! | [`feature`] | Feature workflow state machine |
//! | [`workspace`] | Ephemeral workspace guard |
//! | [`dispatcher`] | Command registry, bounded pool, per-issue serialization |

pub mod dispatcher;
pub mod feature;
pub mod handler;
pub mod prd;
pub mod prompts;
pub mod subtasks;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use dispatcher::{CommandRegistry, Dispatcher};
pub use feature::{feature_branch, FeatureStage, FeatureWorkflow, WorkflowError};
pub use handler::{CommandHandler, RunError, RunOutcome};
pub use prd::{PrdPipeline, README_PATH};
pub use subtasks::SubtaskPipeline;
pub use workspace::Workspace;
