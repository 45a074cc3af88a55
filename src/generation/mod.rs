//! Generation runs: addressing, the pure orchestration plan, the output layout, and the
//! executor that carries a plan out against the generation collaborators.

pub mod addressing;
pub mod executor;
pub mod layout;
pub mod plan;

pub use addressing::{Addressing, ImagePosition, TaskBoundaries};
pub use executor::RunOrchestrator;
pub use layout::OutputLayout;
pub use plan::{
    ImageFailureDetail, ImageFailurePolicy, OrchestrationPlan, PlanOptions, RunSummary,
    WriteInstruction,
};
