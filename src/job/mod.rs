mod lifecycle;
mod state;
mod summary;

pub use lifecycle::{LoopState, RetryConfig};
pub use state::{JobState, JobStatus, PlanStep, StepProgress, TransformRequest, TransformationType};
pub use summary::{JobOutcome, RunSummary};
