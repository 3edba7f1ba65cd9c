pub mod job_parser;
pub mod offer;
pub mod prompts;
pub mod resume_screener;
pub mod specialists;
pub mod traits;

pub use job_parser::JobParserAgent;
pub use offer::{CandidateOffer, OfferLetterAgent};
pub use resume_screener::{ResumeScreenerAgent, ScreeningVerdict};
pub use specialists::{salary_value, CompensationAgent, ScreeningAgent, SourcingAgent};
pub use traits::{AgentBehavior, AgentKind, AgentOutput, AgentRequest, AgentResponse, RecruitingInput};
