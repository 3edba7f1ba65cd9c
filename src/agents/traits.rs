use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::ValidationReport;

/// Form inputs for one recruiting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruitingInput {
    pub job_description: String,
    pub company_name: String,
    pub department: String,
    pub min_salary: i64,
    pub max_salary: i64,
}

impl RecruitingInput {
    pub const DEFAULT_DEPARTMENT: &'static str = "General";

    /// Department as the prompts see it; blank falls back to "General".
    pub fn department_or_default(&self) -> &str {
        let trimmed = self.department.trim();
        if trimmed.is_empty() {
            Self::DEFAULT_DEPARTMENT
        } else {
            trimmed
        }
    }

    /// Midpoint of the salary band, computed without overflowing on extreme budgets.
    pub fn budget_midpoint(&self) -> i64 {
        let (min, max) = (self.min_salary, self.max_salary);
        min / 2 + max / 2 + (min % 2 + max % 2) / 2
    }
}

/// The five prompt agents of the recruiting graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    JobParser,
    Sourcing,
    Screening,
    Compensation,
    OfferLetter,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::JobParser,
        AgentKind::Sourcing,
        AgentKind::Screening,
        AgentKind::Compensation,
        AgentKind::OfferLetter,
    ];

    /// Graph node id.
    pub fn node_name(self) -> &'static str {
        match self {
            AgentKind::JobParser => "parse_job",
            AgentKind::Sourcing => "source_candidates",
            AgentKind::Screening => "create_screening",
            AgentKind::Compensation => "analyze_compensation",
            AgentKind::OfferLetter => "generate_offer",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgentKind::JobParser => "Job Parser",
            AgentKind::Sourcing => "Sourcing",
            AgentKind::Screening => "Screening",
            AgentKind::Compensation => "Compensation",
            AgentKind::OfferLetter => "Offer Letter",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AgentKind::JobParser => "Extracts structured job information",
            AgentKind::Sourcing => "Plans candidate sourcing channels",
            AgentKind::Screening => "Builds screening criteria and questions",
            AgentKind::Compensation => "Recommends salary, benefits and equity",
            AgentKind::OfferLetter => "Drafts the offer letter",
        }
    }

    /// Field name of this agent's artifact in exported results.
    pub fn result_key(self) -> &'static str {
        match self {
            AgentKind::JobParser => "job_analysis",
            AgentKind::Sourcing => "sourcing_strategy",
            AgentKind::Screening => "screening_criteria",
            AgentKind::Compensation => "compensation_package",
            AgentKind::OfferLetter => "offer_letter",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_name())
    }
}

/// Either a JSON object (structured agents) or free text (offer letter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentOutput {
    Json(Map<String, Value>),
    Text(String),
}

impl AgentOutput {
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            AgentOutput::Json(map) => Some(map),
            AgentOutput::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AgentOutput::Text(text) => Some(text),
            AgentOutput::Json(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            AgentOutput::Json(map) => Value::Object(map.clone()),
            AgentOutput::Text(text) => Value::String(text.clone()),
        }
    }
}

/// Input handed to an agent: the form plus whatever upstream agents produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub input: RecruitingInput,
    #[serde(default)]
    pub job_analysis: Option<Map<String, Value>>,
    #[serde(default)]
    pub compensation_package: Option<Map<String, Value>>,
}

impl AgentRequest {
    pub fn new(input: RecruitingInput) -> Self {
        Self {
            input,
            job_analysis: None,
            compensation_package: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub kind: AgentKind,
    pub output: AgentOutput,
    pub validation: ValidationReport,
    pub fallback_used: bool,
    /// One-line progress note for the workflow log.
    pub message: String,
}

#[async_trait]
pub trait AgentBehavior: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Never fails on LLM trouble: those surface as fallback output plus validation errors.
    async fn handle(&self, request: AgentRequest) -> anyhow::Result<AgentResponse>;
}
