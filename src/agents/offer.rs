use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::llm_client::{ChatRequest, SharedLlmClient};
use crate::validation::{ValidationReport, MIN_OFFER_LETTER_CHARS};

use super::prompts;
use super::specialists::{benefits_list, salary_value};
use super::traits::{AgentBehavior, AgentKind, AgentOutput, AgentRequest, AgentResponse};

const DEFAULT_JOB_TITLE: &str = "Software Engineer";
const DEFAULT_TARGET_SALARY: i64 = 100_000;
const DEFAULT_BENEFITS: &str = "Competitive benefits package";
const OFFER_MAX_TOKENS: u16 = 1500;

/// Details for a letter addressed to one named candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOffer {
    pub candidate_name: String,
    pub job_title: String,
    pub company_name: String,
    pub salary: i64,
    pub start_date: String,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub equity: Option<String>,
}

/// Drafts offer letters: the graph's final node, and ad-hoc letters for a chosen candidate.
pub struct OfferLetterAgent {
    llm_client: SharedLlmClient,
}

impl OfferLetterAgent {
    pub fn new(llm_client: SharedLlmClient) -> Self {
        Self { llm_client }
    }

    #[instrument(skip_all, fields(candidate = %offer.candidate_name))]
    pub async fn draft_for_candidate(&self, offer: &CandidateOffer) -> anyhow::Result<String> {
        anyhow::ensure!(
            !offer.candidate_name.trim().is_empty(),
            "Candidate name is required"
        );
        anyhow::ensure!(offer.salary > 0, "Salary must be positive");

        let chat = ChatRequest::new(
            prompts::CANDIDATE_OFFER_SYSTEM,
            prompts::candidate_offer_user(
                offer.candidate_name.trim(),
                offer.job_title.trim(),
                offer.company_name.trim(),
                offer.salary,
                offer.start_date.trim(),
                offer.benefits.as_deref(),
                offer.equity.as_deref(),
            ),
        )
        .max_tokens(OFFER_MAX_TOKENS);

        let letter = self
            .llm_client
            .complete(&chat)
            .await
            .with_context(|| format!("Failed to draft offer letter for {}", offer.candidate_name))?;
        info!(chars = letter.len(), "Offer letter drafted");
        Ok(letter)
    }
}

#[async_trait]
impl AgentBehavior for OfferLetterAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::OfferLetter
    }

    #[instrument(skip_all, fields(role = "OfferLetterAgent"))]
    async fn handle(&self, request: AgentRequest) -> anyhow::Result<AgentResponse> {
        let job_title = request
            .job_analysis
            .as_ref()
            .and_then(|analysis| analysis.get("job_title"))
            .and_then(Value::as_str)
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(DEFAULT_JOB_TITLE);
        let compensation = request.compensation_package.as_ref();
        let target_salary = compensation
            .and_then(|package| package.get("target_salary"))
            .and_then(salary_value)
            .unwrap_or(DEFAULT_TARGET_SALARY);
        let benefits = benefits_list(compensation.and_then(|package| package.get("benefits_package")));
        let benefits = if benefits.is_empty() {
            DEFAULT_BENEFITS.to_string()
        } else {
            benefits.join(", ")
        };

        let chat = ChatRequest::new(
            prompts::OFFER_LETTER_SYSTEM,
            prompts::offer_letter_user(&request.input, job_title, target_salary, &benefits),
        )
        .max_tokens(OFFER_MAX_TOKENS);

        let (letter, validation, fallback_used) = match self.llm_client.complete(&chat).await {
            Ok(letter) => {
                let validation = if letter.chars().count() >= MIN_OFFER_LETTER_CHARS {
                    ValidationReport::passed()
                } else {
                    ValidationReport::failed("Offer Letter: Generated letter is too short")
                };
                (letter, validation, false)
            }
            Err(err) => {
                warn!(?err, "Offer letter generation failed");
                let reason = format!("{err:#}");
                (
                    format!("Error generating offer letter: {reason}"),
                    ValidationReport::failed(format!("Offer Letter: {reason}")),
                    true,
                )
            }
        };

        let message = format!("Offer letter generated: {} characters", letter.chars().count());
        Ok(AgentResponse {
            kind: self.kind(),
            output: AgentOutput::Text(letter),
            validation,
            fallback_used,
            message,
        })
    }
}
