use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::agents::{
    AgentBehavior, AgentRequest, AgentResponse, CandidateOffer, CompensationAgent,
    JobParserAgent, OfferLetterAgent, RecruitingInput, ResumeScreenerAgent, ScreeningVerdict,
    SourcingAgent,
};
use crate::llm_client::SharedLlmClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: String,
    pub name: String,
    pub resume_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreenedCandidate {
    pub candidate: CandidateProfile,
    pub screening: ScreeningVerdict,
}

/// Parse first, then sourcing and compensation side by side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FullAnalysis {
    pub job_analysis: Option<Map<String, Value>>,
    pub sourcing: Option<Map<String, Value>>,
    pub compensation: Option<Map<String, Value>>,
}

/// Direct driver over the agents for callers that do not need the whole graph.
pub struct AnalysisOrchestrator {
    job_parser: JobParserAgent,
    sourcing: SourcingAgent,
    compensation: CompensationAgent,
    screener: ResumeScreenerAgent,
    offers: OfferLetterAgent,
}

impl AnalysisOrchestrator {
    pub fn new(llm_client: SharedLlmClient) -> Self {
        info!("Analysis orchestrator initialised with all agents");
        Self {
            job_parser: JobParserAgent::new(llm_client.clone()),
            sourcing: SourcingAgent::new(llm_client.clone()),
            compensation: CompensationAgent::new(llm_client.clone()),
            screener: ResumeScreenerAgent::new(llm_client.clone()),
            offers: OfferLetterAgent::new(llm_client),
        }
    }

    #[instrument(skip_all, fields(company = %input.company_name))]
    pub async fn full_analysis(&self, input: RecruitingInput) -> FullAnalysis {
        let job_analysis = branch_output(self.job_parser.handle(AgentRequest::new(input.clone())).await);

        let mut request = AgentRequest::new(input);
        request.job_analysis = job_analysis.clone();
        let (sourcing, compensation) = tokio::join!(
            self.sourcing.handle(request.clone()),
            self.compensation.handle(request),
        );

        FullAnalysis {
            job_analysis,
            sourcing: branch_output(sourcing),
            compensation: branch_output(compensation),
        }
    }

    /// Screens every resume concurrently; failed screenings are logged and left out.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn screen_candidates(
        &self,
        jd_text: &str,
        candidates: Vec<CandidateProfile>,
        job_analysis: Option<&Map<String, Value>>,
    ) -> Vec<ScreenedCandidate> {
        let screenings = join_all(
            candidates
                .iter()
                .map(|candidate| self.screener.screen(jd_text, &candidate.resume_text, job_analysis)),
        )
        .await;

        candidates
            .into_iter()
            .zip(screenings)
            .filter_map(|(candidate, outcome)| match outcome {
                Ok(screening) => Some(ScreenedCandidate { candidate, screening }),
                Err(err) => {
                    warn!(candidate = %candidate.id, ?err, "Screening failed");
                    None
                }
            })
            .collect()
    }

    pub async fn draft_offer(&self, offer: &CandidateOffer) -> anyhow::Result<String> {
        self.offers.draft_for_candidate(offer).await
    }
}

/// A branch counts only when the agent produced real output, not its fallback.
fn branch_output(outcome: anyhow::Result<AgentResponse>) -> Option<Map<String, Value>> {
    match outcome {
        Ok(response) if !response.fallback_used => response.output.as_object().cloned(),
        Ok(response) => {
            warn!(agent = response.kind.label(), "Branch produced fallback output only");
            None
        }
        Err(err) => {
            warn!(?err, "Branch failed");
            None
        }
    }
}
