pub mod analysis;
pub mod graph;
pub mod workflow;

pub use analysis::{AnalysisOrchestrator, CandidateProfile};
pub use graph::WorkflowGraph;
pub use workflow::{RecruitingWorkflow, WorkflowResult};
