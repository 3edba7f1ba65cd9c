use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::instrument;

use crate::llm_client::{ChatRequest, SharedLlmClient};

use super::prompts;
use super::specialists::{object, run_structured};
use super::traits::{AgentBehavior, AgentKind, AgentOutput, AgentRequest, AgentResponse};

const MAX_SUMMARY_SKILLS: usize = 10;

/// Turns a free-form job description into a structured analysis.
pub struct JobParserAgent {
    llm_client: SharedLlmClient,
}

impl JobParserAgent {
    const EXPECTED_FIELDS: [&'static str; 6] = [
        "job_title",
        "experience_level",
        "employment_type",
        "required_skills",
        "responsibilities",
        "qualifications",
    ];

    pub fn new(llm_client: SharedLlmClient) -> Self {
        Self { llm_client }
    }

    fn fallback() -> Map<String, Value> {
        object(json!({
            "job_title": "Software Engineer",
            "experience_level": "3+ years",
            "employment_type": "Full-time",
            "required_skills": ["Python"],
            "nice_to_have_skills": ["AWS"],
            "responsibilities": ["Develop software"],
            "qualifications": ["Bachelor's degree"],
        }))
    }
}

#[async_trait]
impl AgentBehavior for JobParserAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::JobParser
    }

    #[instrument(skip_all, fields(role = "JobParserAgent"))]
    async fn handle(&self, request: AgentRequest) -> anyhow::Result<AgentResponse> {
        let chat = ChatRequest::new(
            prompts::JOB_PARSER_SYSTEM,
            prompts::job_parser_user(&request.input),
        )
        .temperature(0.3)
        .json();
        let outcome = run_structured(
            &self.llm_client,
            self.kind(),
            chat,
            &Self::EXPECTED_FIELDS,
            Self::fallback,
        )
        .await;

        let title = outcome
            .data
            .get("job_title")
            .and_then(Value::as_str)
            .unwrap_or("N/A")
            .to_string();

        Ok(AgentResponse {
            kind: self.kind(),
            output: AgentOutput::Json(outcome.data),
            validation: outcome.validation,
            fallback_used: outcome.fallback_used,
            message: format!("Job Parser completed: {title}"),
        })
    }
}

/// One-line summary used as extra context when screening resumes,
/// e.g. `Title: SRE | Experience: 5+ years | Skills: Go, Kubernetes`.
pub fn extract_key_requirements(analysis: &Map<String, Value>) -> String {
    let field = |keys: &[&str]| keys.iter().find_map(|key| analysis.get(*key)).filter(|v| !v.is_null());
    let mut parts = Vec::new();

    if let Some(title) = field(&["job_title", "title"]).and_then(display_scalar) {
        parts.push(format!("Title: {title}"));
    }
    if let Some(experience) =
        field(&["experience_level", "experience_required"]).and_then(display_scalar)
    {
        parts.push(format!("Experience: {experience}"));
    }
    match field(&["required_skills", "skills"]) {
        Some(Value::Array(skills)) if !skills.is_empty() => {
            let skills: Vec<String> = skills
                .iter()
                .take(MAX_SUMMARY_SKILLS)
                .filter_map(display_scalar)
                .collect();
            parts.push(format!("Skills: {}", skills.join(", ")));
        }
        Some(other) => {
            if let Some(skills) = display_scalar(other) {
                parts.push(format!("Skills: {skills}"));
            }
        }
        None => {}
    }

    parts.join(" | ")
}

fn display_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::traits::RecruitingInput;
    use crate::llm_client::testing::ScriptedLlmClient;

    fn request() -> AgentRequest {
        AgentRequest::new(RecruitingInput {
            job_description: "Staff SRE to run our Kubernetes fleet. 7+ years with Go and Terraform."
                .to_string(),
            company_name: "Acme".to_string(),
            department: "Platform".to_string(),
            min_salary: 180_000,
            max_salary: 220_000,
        })
    }

    #[tokio::test]
    async fn parses_fenced_json_and_validates_fields() {
        let llm = ScriptedLlmClient::new()
            .reply(
                "parsing job descriptions",
                "```json\n{\"job_title\":\"Staff SRE\",\"experience_level\":\"7+ years\",\"employment_type\":\"Full-time\",\
                 \"required_skills\":[\"Go\"],\"responsibilities\":[\"Run clusters\"],\"qualifications\":[]}\n```",
            )
            .shared();
        let response = JobParserAgent::new(llm.clone())
            .handle(request())
            .await
            .expect("handled");

        assert!(!response.fallback_used);
        assert!(response.validation.valid);
        assert_eq!(
            response.validation.warnings,
            vec!["Job Parser: Field 'qualifications' is empty"]
        );
        assert_eq!(response.message, "Job Parser completed: Staff SRE");

        let call = &llm.calls()[0];
        assert!(call.json_mode);
        assert!(call.user.contains("Department: Platform"));
    }

    #[tokio::test]
    async fn missing_fields_are_validation_errors_not_fallbacks() {
        let llm = ScriptedLlmClient::new()
            .reply("parsing job descriptions", r#"{"job_title":"SRE"}"#)
            .shared();
        let response = JobParserAgent::new(llm).handle(request()).await.expect("handled");

        assert!(!response.fallback_used);
        assert!(!response.validation.valid);
        assert!(response.validation.errors[0].starts_with("Job Parser: Missing fields: experience_level"));
    }

    #[tokio::test]
    async fn prose_reply_uses_fallback_analysis() {
        let llm = ScriptedLlmClient::new()
            .reply("parsing job descriptions", "I think this is an SRE role.")
            .shared();
        let response = JobParserAgent::new(llm).handle(request()).await.expect("handled");

        assert!(response.fallback_used);
        let data = response.output.as_object().expect("json");
        assert_eq!(data["job_title"], "Software Engineer");
        assert_eq!(data["error"], "Failed to parse LLM response");
        assert_eq!(response.message, "Job Parser completed: Software Engineer");
    }

    #[test]
    fn key_requirements_summary() {
        let analysis = object(json!({
            "job_title": "Backend Engineer",
            "experience_level": "5+ years",
            "required_skills": ["Rust", "Postgres", "Kafka", "AWS", "Docker", "gRPC",
                                "Redis", "Linux", "Terraform", "Go", "Python", "C"],
        }));
        let summary = extract_key_requirements(&analysis);
        assert!(summary.starts_with("Title: Backend Engineer | Experience: 5+ years | Skills: Rust, Postgres"));
        assert!(summary.ends_with("Terraform, Go"));
        assert!(!summary.contains("Python"));
    }

    #[test]
    fn key_requirements_accepts_alternate_keys() {
        let analysis = object(json!({"title": "Designer", "skills": "Figma"}));
        assert_eq!(extract_key_requirements(&analysis), "Title: Designer | Skills: Figma");
        assert_eq!(extract_key_requirements(&Map::new()), "");
    }
}
