pub mod cleanup;
pub mod orchestrator;
pub mod plan;
pub mod state;

pub use cleanup::{Cleanup, CleanupRegistry};
pub use orchestrator::TestOrchestrator;
pub use plan::{CategoryPlan, RunPlan};
pub use state::{RunOutcome, RunState, RunStatus};
