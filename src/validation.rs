//! Input, per-agent output and whole-run checks.
//!
//! Errors make a report invalid; warnings are advisory and never block a run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::{AgentKind, AgentOutput, RecruitingInput};

pub const MIN_DESCRIPTION_CHARS: usize = 50;
pub const LONG_DESCRIPTION_CHARS: usize = 5000;
pub const LOW_SALARY_WARNING: i64 = 20_000;
pub const HIGH_SALARY_WARNING: i64 = 1_000_000;
pub const MIN_OFFER_LETTER_CHARS: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn passed() -> Self {
        Self::from_findings(Vec::new(), Vec::new())
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::from_findings(vec![error.into()], Vec::new())
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.valid = false;
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

pub fn validate_input(input: &RecruitingInput) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let description = input.job_description.trim();
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        errors.push(format!(
            "Job description must be at least {MIN_DESCRIPTION_CHARS} characters"
        ));
    }
    if input.job_description.chars().count() > LONG_DESCRIPTION_CHARS {
        warnings.push("Very long job description - may increase processing time".to_string());
    }

    if input.company_name.trim().is_empty() {
        errors.push("Company name is required".to_string());
    }

    if input.department.trim().is_empty() {
        warnings.push(format!(
            "Department not specified - using '{}'",
            RecruitingInput::DEFAULT_DEPARTMENT
        ));
    }

    let (min, max) = (input.min_salary, input.max_salary);
    if min <= 0 || max <= 0 {
        errors.push("Salary range must be positive numbers".to_string());
    }
    if min >= max {
        errors.push("Minimum salary must be less than maximum salary".to_string());
    }
    if min < LOW_SALARY_WARNING {
        warnings.push("Minimum salary seems very low".to_string());
    }
    if max > HIGH_SALARY_WARNING {
        warnings.push("Maximum salary seems very high".to_string());
    }

    ValidationReport::from_findings(errors, warnings)
}

/// Checks that `output` is an object carrying every expected field with a non-empty value.
/// Well-known fields holding the wrong JSON type produce warnings.
pub fn validate_agent_output(agent_name: &str, output: &Value, expected_fields: &[&str]) -> ValidationReport {
    let Some(object) = output.as_object() else {
        return ValidationReport::failed(format!("{agent_name}: Output must be a dictionary"));
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let missing: Vec<&str> = expected_fields
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        errors.push(format!("{agent_name}: Missing fields: {}", missing.join(", ")));
    }

    for field in expected_fields {
        if let Some(value) = object.get(*field) {
            if is_empty_value(value) {
                warnings.push(format!("{agent_name}: Field '{field}' is empty"));
            }
        }
    }

    for (field, value) in object {
        let Some(expected) = expected_shape(field) else {
            continue;
        };
        if !value.is_null() && !expected.matches(value) {
            warnings.push(format!(
                "{agent_name}: Field '{field}' should be {}, got {}",
                expected.name(),
                shape_name(value)
            ));
        }
    }

    ValidationReport::from_findings(errors, warnings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    List,
    Number,
    Text,
}

impl Shape {
    fn matches(self, value: &Value) -> bool {
        match self {
            Shape::List => value.is_array(),
            Shape::Number => value.is_number(),
            Shape::Text => value.is_string(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Shape::List => "list",
            Shape::Number => "number",
            Shape::Text => "string",
        }
    }
}

/// Well-known agent fields with a fixed JSON shape.
fn expected_shape(field: &str) -> Option<Shape> {
    match field {
        "required_skills" | "responsibilities" | "platforms" | "screening_questions" | "benefits_package" => {
            Some(Shape::List)
        }
        "target_salary" => Some(Shape::Number),
        "job_title" | "experience_level" => Some(Shape::Text),
        _ => None,
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Whole-run check: every agent reported, none flagged an error, and the offer has a salary.
pub fn validate_workflow(outputs: &BTreeMap<AgentKind, AgentOutput>) -> ValidationReport {
    let mut report = ValidationReport::passed();

    let missing: Vec<&str> = AgentKind::ALL
        .iter()
        .filter(|kind| !outputs.contains_key(kind))
        .map(|kind| kind.node_name())
        .collect();
    if !missing.is_empty() {
        report.push_error(format!("Missing results from agents: {}", missing.join(", ")));
    }

    for (kind, output) in outputs {
        if let Some(error) = output
            .as_object()
            .and_then(|map| map.get("error"))
            .filter(|value| !is_empty_value(value))
        {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            report.push_error(format!("{} reported error: {message}", kind.node_name()));
        }
    }

    if outputs.contains_key(&AgentKind::OfferLetter) {
        let target = outputs
            .get(&AgentKind::Compensation)
            .and_then(AgentOutput::as_object)
            .and_then(|map| map.get("target_salary"))
            .and_then(crate::agents::salary_value)
            .unwrap_or(0);
        if target == 0 {
            report.push_warning("Compensation has no target salary for offer letter");
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_input() -> RecruitingInput {
        RecruitingInput {
            job_description: "Senior Python Developer with 5+ years of experience in Django, AWS and SQL."
                .to_string(),
            company_name: "TechCorp".to_string(),
            department: "Engineering".to_string(),
            min_salary: 120_000,
            max_salary: 160_000,
        }
    }

    #[test]
    fn accepts_a_reasonable_form() {
        let report = validate_input(&valid_input());
        assert!(report.valid, "{report:?}");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn rejects_short_description_missing_company_and_inverted_budget() {
        let input = RecruitingInput {
            job_description: "Python dev".to_string(),
            company_name: " ".to_string(),
            min_salary: 150_000,
            max_salary: 100_000,
            ..valid_input()
        };
        let report = validate_input(&input);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 3, "{:?}", report.errors);
        assert!(report.errors.iter().any(|e| e.contains("at least 50")));
        assert!(report.errors.iter().any(|e| e.contains("Company name")));
        assert!(report.errors.iter().any(|e| e.contains("less than maximum")));
    }

    #[test]
    fn warns_on_odd_but_legal_values() {
        let input = RecruitingInput {
            department: String::new(),
            min_salary: 15_000,
            max_salary: 2_000_000,
            ..valid_input()
        };
        let report = validate_input(&input);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 3, "{:?}", report.warnings);
    }

    #[test]
    fn non_positive_salary_is_an_error() {
        let input = RecruitingInput {
            min_salary: 0,
            ..valid_input()
        };
        let report = validate_input(&input);
        assert!(report.errors.iter().any(|e| e.contains("positive")));
    }

    #[test]
    fn agent_output_reports_missing_and_empty_fields() {
        let output = json!({
            "job_title": "SRE",
            "required_skills": [],
        });
        let report = validate_agent_output(
            "Job Parser",
            &output,
            &["job_title", "required_skills", "responsibilities"],
        );
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["Job Parser: Missing fields: responsibilities"]);
        assert_eq!(report.warnings, vec!["Job Parser: Field 'required_skills' is empty"]);
    }

    #[test]
    fn agent_output_flags_mistyped_fields() {
        let output = json!({
            "job_title": "SRE",
            "experience_level": 5,
            "required_skills": "Go, Rust",
            "target_salary": "$150,000",
            "benefits_package": null,
            "notes": 3,
        });
        let report = validate_agent_output("Job Parser", &output, &["job_title", "required_skills"]);
        assert!(report.valid);
        assert_eq!(
            report.warnings,
            vec![
                "Job Parser: Field 'experience_level' should be string, got number",
                "Job Parser: Field 'required_skills' should be list, got string",
                "Job Parser: Field 'target_salary' should be number, got string",
            ]
        );
    }

    #[test]
    fn very_long_description_is_only_a_warning() {
        let input = RecruitingInput {
            job_description: "Rust ".repeat(LONG_DESCRIPTION_CHARS / 5 + 1),
            ..valid_input()
        };
        let report = validate_input(&input);
        assert!(report.valid, "{report:?}");
        assert_eq!(
            report.warnings,
            vec!["Very long job description - may increase processing time"]
        );
    }

    #[test]
    fn agent_output_must_be_an_object() {
        let report = validate_agent_output("Sourcing", &json!(["LinkedIn"]), &["platforms"]);
        assert_eq!(report.errors, vec!["Sourcing: Output must be a dictionary"]);
    }

    #[test]
    fn workflow_flags_missing_agents_errors_and_zero_salary() {
        let mut outputs = BTreeMap::new();
        outputs.insert(
            AgentKind::JobParser,
            AgentOutput::Json(json!({"job_title": "SRE", "error": "Failed to parse LLM response"}).as_object().cloned().unwrap_or_default()),
        );
        outputs.insert(
            AgentKind::Compensation,
            AgentOutput::Json(json!({"benefits_package": []}).as_object().cloned().unwrap_or_default()),
        );
        outputs.insert(AgentKind::OfferLetter, AgentOutput::Text("Dear candidate".to_string()));

        let report = validate_workflow(&outputs);
        assert!(!report.valid);
        assert!(report.errors[0].contains("source_candidates, create_screening"));
        assert!(report.errors.iter().any(|e| e.starts_with("parse_job reported error")));
        assert_eq!(report.warnings, vec!["Compensation has no target salary for offer letter"]);
    }
}
