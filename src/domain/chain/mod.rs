//! Chain domain - Caller-facing execution contract and the partitioning rule

mod executor;
mod plan;

pub use executor::ChainExecutor;
pub use plan::{ExecutionPlan, PlannedBlock};
