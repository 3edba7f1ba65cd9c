use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};

use crate::llm_client::{parse_json_object, ChatRequest, SharedLlmClient};
use crate::validation::{validate_agent_output, ValidationReport};

use super::prompts::{self, format_thousands};
use super::traits::{
    AgentBehavior, AgentKind, AgentOutput, AgentRequest, AgentResponse, RecruitingInput,
};

/// Result of one structured (JSON) agent call, fallback already applied.
pub(crate) struct StructuredOutcome {
    pub data: Map<String, Value>,
    pub validation: ValidationReport,
    pub fallback_used: bool,
}

/// Sends `request`, parses a JSON object, validates it against `expected`.
/// Transport or parse failures yield `fallback` tagged with an `error` field.
pub(crate) async fn run_structured(
    llm: &SharedLlmClient,
    kind: AgentKind,
    request: ChatRequest,
    expected: &[&str],
    fallback: impl FnOnce() -> Map<String, Value>,
) -> StructuredOutcome {
    let parsed = match llm.complete(&request).await {
        Ok(raw) => parse_json_object(&raw).map_err(|err| {
            warn!(agent = kind.label(), ?err, "Agent returned unparseable JSON");
            "Failed to parse LLM response".to_string()
        }),
        Err(err) => {
            warn!(agent = kind.label(), ?err, "Agent LLM call failed");
            Err(format!("{err:#}"))
        }
    };

    match parsed {
        Ok(data) => {
            let validation =
                validate_agent_output(kind.label(), &Value::Object(data.clone()), expected);
            StructuredOutcome {
                data,
                validation,
                fallback_used: false,
            }
        }
        Err(reason) => {
            let mut data = fallback();
            data.insert("error".to_string(), Value::String(reason.clone()));
            StructuredOutcome {
                data,
                validation: ValidationReport::failed(format!("{}: {reason}", kind.label())),
                fallback_used: true,
            }
        }
    }
}

pub(crate) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Reads a salary that may arrive as a number or as text like "$130,000".
pub fn salary_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let digits: String = s
                .split('.')
                .next()
                .unwrap_or_default()
                .chars()
                .filter(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Benefits may be a list of strings, a list of objects, or one string.
pub fn benefits_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                Value::Object(map) => map
                    .get("name")
                    .or_else(|| map.get("benefit"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| item.to_string()),
                other => other.to_string(),
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

pub(crate) fn array_len(map: &Map<String, Value>, field: &str) -> usize {
    map.get(field).and_then(Value::as_array).map_or(0, Vec::len)
}

pub struct SourcingAgent {
    llm_client: SharedLlmClient,
}

impl SourcingAgent {
    const EXPECTED_FIELDS: [&'static str; 4] =
        ["platforms", "search_keywords", "outreach_strategy", "timeline"];

    pub fn new(llm_client: SharedLlmClient) -> Self {
        Self { llm_client }
    }

    fn fallback() -> Map<String, Value> {
        object(json!({
            "platforms": [{"name": "LinkedIn", "reason": "Professional network"}],
            "search_keywords": ["Python Developer"],
            "sourcing_channels": ["Job boards"],
            "outreach_strategy": "Direct outreach",
            "timeline": "2-4 weeks",
        }))
    }
}

#[async_trait]
impl AgentBehavior for SourcingAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Sourcing
    }

    #[instrument(skip_all, fields(role = "SourcingAgent"))]
    async fn handle(&self, request: AgentRequest) -> anyhow::Result<AgentResponse> {
        let chat = ChatRequest::new(prompts::SOURCING_SYSTEM, prompts::sourcing_user(&request.input))
            .json();
        let outcome = run_structured(
            &self.llm_client,
            self.kind(),
            chat,
            &Self::EXPECTED_FIELDS,
            Self::fallback,
        )
        .await;

        let message = format!(
            "Sourcing strategy created with {} platforms",
            array_len(&outcome.data, "platforms")
        );
        Ok(AgentResponse {
            kind: self.kind(),
            output: AgentOutput::Json(outcome.data),
            validation: outcome.validation,
            fallback_used: outcome.fallback_used,
            message,
        })
    }
}

pub struct ScreeningAgent {
    llm_client: SharedLlmClient,
}

impl ScreeningAgent {
    const EXPECTED_FIELDS: [&'static str; 2] = ["must_have_criteria", "screening_questions"];

    pub fn new(llm_client: SharedLlmClient) -> Self {
        Self { llm_client }
    }

    fn fallback() -> Map<String, Value> {
        object(json!({
            "must_have_criteria": ["Relevant experience"],
            "nice_to_have_criteria": ["Advanced skills"],
            "screening_questions": ["Tell me about your experience"],
            "technical_assessment": "Coding challenge",
            "evaluation_rubric": "Standard evaluation",
        }))
    }
}

#[async_trait]
impl AgentBehavior for ScreeningAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Screening
    }

    #[instrument(skip_all, fields(role = "ScreeningAgent"))]
    async fn handle(&self, request: AgentRequest) -> anyhow::Result<AgentResponse> {
        let chat = ChatRequest::new(prompts::SCREENING_SYSTEM, prompts::screening_user(&request.input))
            .json();
        let outcome = run_structured(
            &self.llm_client,
            self.kind(),
            chat,
            &Self::EXPECTED_FIELDS,
            Self::fallback,
        )
        .await;

        let message = format!(
            "Screening criteria created with {} questions",
            array_len(&outcome.data, "screening_questions")
        );
        Ok(AgentResponse {
            kind: self.kind(),
            output: AgentOutput::Json(outcome.data),
            validation: outcome.validation,
            fallback_used: outcome.fallback_used,
            message,
        })
    }
}

pub struct CompensationAgent {
    llm_client: SharedLlmClient,
}

impl CompensationAgent {
    const EXPECTED_FIELDS: [&'static str; 2] = ["target_salary", "benefits_package"];

    pub fn new(llm_client: SharedLlmClient) -> Self {
        Self { llm_client }
    }

    fn fallback(input: &RecruitingInput) -> Map<String, Value> {
        object(json!({
            "market_analysis": "Competitive market",
            "recommended_salary_range": {"min": input.min_salary, "max": input.max_salary},
            "target_salary": input.budget_midpoint(),
            "benefits_package": ["Health insurance", "PTO"],
            "equity_structure": "Standard equity",
            "justification": "Market competitive",
        }))
    }
}

#[async_trait]
impl AgentBehavior for CompensationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Compensation
    }

    #[instrument(skip_all, fields(role = "CompensationAgent"))]
    async fn handle(&self, request: AgentRequest) -> anyhow::Result<AgentResponse> {
        let (min, max) = (request.input.min_salary, request.input.max_salary);
        let chat = ChatRequest::new(
            prompts::COMPENSATION_SYSTEM,
            prompts::compensation_user(&request.input),
        )
        .json();
        let mut outcome = run_structured(
            &self.llm_client,
            self.kind(),
            chat,
            &Self::EXPECTED_FIELDS,
            || Self::fallback(&request.input),
        )
        .await;

        if !outcome.fallback_used {
            if let Some(target) = outcome.data.get("target_salary").and_then(salary_value) {
                if target < min || target > max {
                    outcome.validation.push_warning(format!(
                        "Target salary ${} is outside budget range",
                        format_thousands(target)
                    ));
                }
            }

            outcome
                .data
                .entry("recommended_salary_range")
                .or_insert_with(|| json!({"min": min, "max": max}));
        }

        let target = outcome
            .data
            .get("target_salary")
            .and_then(salary_value)
            .unwrap_or(0);
        info!(target, "Compensation package ready");

        Ok(AgentResponse {
            kind: self.kind(),
            output: AgentOutput::Json(outcome.data),
            validation: outcome.validation,
            fallback_used: outcome.fallback_used,
            message: format!("Compensation package created: ${}", format_thousands(target)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedLlmClient;

    fn request(min: i64, max: i64) -> AgentRequest {
        AgentRequest::new(RecruitingInput {
            job_description: "Senior Python Developer with 5+ years of Django and AWS experience."
                .to_string(),
            company_name: "TechCorp".to_string(),
            department: "Engineering".to_string(),
            min_salary: min,
            max_salary: max,
        })
    }

    #[test]
    fn salary_values_from_numbers_and_text() {
        assert_eq!(salary_value(&json!(130000)), Some(130_000));
        assert_eq!(salary_value(&json!(130000.6)), Some(130_001));
        assert_eq!(salary_value(&json!("$130,000")), Some(130_000));
        assert_eq!(salary_value(&json!("$130,000.50")), Some(130_000));
        assert_eq!(salary_value(&json!("competitive")), None);
        assert_eq!(salary_value(&json!(null)), None);
    }

    #[test]
    fn benefits_accept_strings_and_objects() {
        let value = json!(["Health insurance", {"name": "401k"}, ""]);
        assert_eq!(benefits_list(Some(&value)), vec!["Health insurance", "401k"]);
        assert_eq!(benefits_list(Some(&json!("PTO"))), vec!["PTO"]);
        assert!(benefits_list(None).is_empty());
    }

    #[tokio::test]
    async fn sourcing_counts_platforms() {
        let llm = ScriptedLlmClient::new()
            .reply(
                "talent acquisition",
                r#"{"platforms":[{"name":"GitHub","reason":"code"},{"name":"LinkedIn","reason":"network"}],
                    "search_keywords":["django"],"outreach_strategy":"warm intros","timeline":"3 weeks"}"#,
            )
            .shared();
        let agent = SourcingAgent::new(llm.clone());
        let response = agent.handle(request(100_000, 150_000)).await.expect("handled");

        assert!(!response.fallback_used);
        assert!(response.validation.valid);
        assert_eq!(response.message, "Sourcing strategy created with 2 platforms");
        assert!(llm.calls()[0].json_mode);
        assert_eq!(llm.calls()[0].temperature, None);
    }

    #[tokio::test]
    async fn screening_falls_back_on_prose() {
        let llm = ScriptedLlmClient::new()
            .reply("HR interviewer", "Here are some questions you could ask...")
            .shared();
        let response = ScreeningAgent::new(llm).handle(request(1, 2)).await.expect("handled");

        assert!(response.fallback_used);
        assert_eq!(response.validation.errors, vec!["Screening: Failed to parse LLM response"]);
        let data = response.output.as_object().expect("json");
        assert_eq!(data["error"], "Failed to parse LLM response");
        assert_eq!(data["screening_questions"][0], "Tell me about your experience");
    }

    #[tokio::test]
    async fn compensation_warns_outside_budget_and_fills_range() {
        let llm = ScriptedLlmClient::new()
            .reply(
                "compensation analyst",
                r#"{"target_salary": 175000, "benefits_package": ["Health", "PTO"]}"#,
            )
            .shared();
        let response = CompensationAgent::new(llm)
            .handle(request(120_000, 160_000))
            .await
            .expect("handled");

        assert!(response.validation.valid);
        assert_eq!(
            response.validation.warnings,
            vec!["Target salary $175,000 is outside budget range"]
        );
        let data = response.output.as_object().expect("json");
        assert_eq!(data["recommended_salary_range"], json!({"min": 120000, "max": 160000}));
        assert_eq!(response.message, "Compensation package created: $175,000");
    }

    #[tokio::test]
    async fn compensation_fallback_targets_budget_midpoint_on_transport_error() {
        let llm = ScriptedLlmClient::new()
            .fail("compensation analyst", "connection reset")
            .shared();
        let response = CompensationAgent::new(llm)
            .handle(request(120_000, 160_000))
            .await
            .expect("handled");

        assert!(response.fallback_used);
        let data = response.output.as_object().expect("json");
        assert_eq!(data["target_salary"], 140_000);
        assert!(data["error"].as_str().unwrap_or_default().contains("connection reset"));
        assert!(response.validation.errors[0].starts_with("Compensation: "));
    }

    #[tokio::test]
    async fn compensation_fallback_survives_extreme_budget() {
        let llm = ScriptedLlmClient::new()
            .reply("compensation analyst", "no json today")
            .shared();
        let response = CompensationAgent::new(llm)
            .handle(request(i64::MAX - 10, i64::MAX))
            .await
            .expect("handled");

        assert!(response.fallback_used);
        let data = response.output.as_object().expect("json");
        assert_eq!(data["target_salary"], i64::MAX - 5);
    }
}
