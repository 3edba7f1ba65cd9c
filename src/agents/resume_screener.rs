use std::fmt;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::llm_client::{parse_json_object, ChatRequest, SharedLlmClient};

use super::job_parser::extract_key_requirements;
use super::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Hire,
    Maybe,
    Reject,
}

impl Recommendation {
    /// Unrecognised labels are treated as `Maybe`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "HIRE" => Recommendation::Hire,
            "REJECT" => Recommendation::Reject,
            _ => Recommendation::Maybe,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recommendation::Hire => "HIRE",
            Recommendation::Maybe => "MAYBE",
            Recommendation::Reject => "REJECT",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningVerdict {
    pub score: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendation: Recommendation,
    pub reasoning: String,
}

impl ScreeningVerdict {
    pub fn passes(&self, threshold: u8) -> bool {
        self.score >= threshold
    }

    fn from_object(map: &Map<String, Value>) -> anyhow::Result<Self> {
        let score = match map.get("score") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().trim_end_matches('%').parse().ok(),
            _ => None,
        }
        .context("Screening response has no numeric score")?;

        let list = |key: &str| -> Vec<String> {
            match map.get(key) {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
                _ => Vec::new(),
            }
        };

        Ok(Self {
            score: score.round().clamp(0.0, 100.0) as u8,
            strengths: list("strengths"),
            weaknesses: list("weaknesses"),
            recommendation: Recommendation::parse(
                map.get("recommendation").and_then(Value::as_str).unwrap_or_default(),
            ),
            reasoning: map
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Scores one resume against a job description.
pub struct ResumeScreenerAgent {
    llm_client: SharedLlmClient,
}

impl ResumeScreenerAgent {
    pub fn new(llm_client: SharedLlmClient) -> Self {
        Self { llm_client }
    }

    #[instrument(skip_all, fields(jd_chars = jd_text.len(), resume_chars = resume_text.len()))]
    pub async fn screen(
        &self,
        jd_text: &str,
        resume_text: &str,
        job_analysis: Option<&Map<String, Value>>,
    ) -> anyhow::Result<ScreeningVerdict> {
        let requirements = job_analysis.map(extract_key_requirements);
        let chat = ChatRequest::new(
            prompts::RESUME_SCREENER_SYSTEM,
            prompts::resume_screener_user(jd_text, resume_text, requirements.as_deref()),
        )
        .temperature(0.5)
        .json();

        let raw = self.llm_client.complete(&chat).await?;
        let verdict = ScreeningVerdict::from_object(&parse_json_object(&raw)?)?;
        info!(score = verdict.score, recommendation = %verdict.recommendation, "Resume screened");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedLlmClient;
    use serde_json::json;

    const MARKER: &str = "resume screener";

    #[test]
    fn recommendation_labels() {
        assert_eq!(Recommendation::parse("hire"), Recommendation::Hire);
        assert_eq!(Recommendation::parse(" REJECT "), Recommendation::Reject);
        assert_eq!(Recommendation::parse("strong yes"), Recommendation::Maybe);
        assert_eq!(Recommendation::Hire.to_string(), "HIRE");
    }

    #[tokio::test]
    async fn screens_with_key_requirements() {
        let llm = ScriptedLlmClient::new()
            .reply(
                MARKER,
                r#"{"score": 82, "strengths": ["Django", "AWS"], "weaknesses": ["No Kafka"],
                    "recommendation": "HIRE", "reasoning": "Strong backend background"}"#,
            )
            .shared();
        let analysis = json!({"job_title": "Backend Engineer", "required_skills": ["Django"]});
        let verdict = ResumeScreenerAgent::new(llm.clone())
            .screen("JD text", "Resume text", analysis.as_object())
            .await
            .expect("verdict");

        assert_eq!(verdict.score, 82);
        assert_eq!(verdict.recommendation, Recommendation::Hire);
        assert!(verdict.passes(70));
        assert!(!verdict.passes(90));
        assert!(llm.calls()[0]
            .user
            .contains("Key Requirements: Title: Backend Engineer | Skills: Django"));
    }

    #[tokio::test]
    async fn score_may_arrive_as_text_and_is_clamped() {
        let llm = ScriptedLlmClient::new()
            .reply(MARKER, r#"{"score": "140%", "recommendation": "unsure"}"#)
            .shared();
        let verdict = ResumeScreenerAgent::new(llm)
            .screen("JD", "Resume", None)
            .await
            .expect("verdict");
        assert_eq!(verdict.score, 100);
        assert_eq!(verdict.recommendation, Recommendation::Maybe);
        assert!(verdict.strengths.is_empty());
    }

    #[tokio::test]
    async fn missing_score_is_an_error() {
        let llm = ScriptedLlmClient::new()
            .reply(MARKER, r#"{"recommendation": "HIRE"}"#)
            .shared();
        let err = ResumeScreenerAgent::new(llm)
            .screen("JD", "Resume", None)
            .await
            .expect_err("no score");
        assert!(err.to_string().contains("numeric score"));
    }
}
