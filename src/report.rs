use std::fmt::Write as _;

use serde_json::Value;

use crate::agents::prompts::format_thousands;
use crate::agents::AgentKind;
use crate::batch::{BatchItem, BatchStatus};
use crate::orchestrator::WorkflowResult;

const RULE: &str = "============================================================";

fn list_len(value: Option<&Value>) -> usize {
    value.and_then(Value::as_array).map_or(0, Vec::len)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    Value::Object(map) => match (map.get("name").and_then(Value::as_str), map.get("reason").and_then(Value::as_str)) {
                        (Some(name), Some(reason)) => format!("{name}: {reason}"),
                        (Some(name), None) => name.to_string(),
                        _ => item.to_string(),
                    },
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Human-readable summary of one recruiting run.
pub fn render_workflow(result: &WorkflowResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "RECRUITING WORKFLOW RESULTS: {}", result.input.company_name.trim());
    let _ = writeln!(out, "{RULE}");

    if !result.input_accepted() {
        let _ = writeln!(out, "Input rejected:");
        for error in &result.input_validation.errors {
            let _ = writeln!(out, "  x {error}");
        }
        return out;
    }

    let analysis = result.job_analysis();
    let sourcing = result.sourcing_strategy();
    let screening = result.screening_criteria();

    let _ = writeln!(out, "Job Title:           {}", result.job_title().unwrap_or("N/A"));
    let _ = writeln!(
        out,
        "Target Salary:       {}",
        result
            .target_salary()
            .map(|salary| format!("${}", format_thousands(salary)))
            .unwrap_or_else(|| "N/A".to_string())
    );
    let _ = writeln!(out, "Sourcing Platforms:  {}", list_len(sourcing.and_then(|s| s.get("platforms"))));
    let _ = writeln!(
        out,
        "Screening Questions: {}",
        list_len(screening.and_then(|s| s.get("screening_questions")))
    );

    let skills = string_list(analysis.and_then(|a| a.get("required_skills")));
    if !skills.is_empty() {
        let _ = writeln!(out, "\nRequired Skills: {}", skills.join(", "));
    }

    let platforms = string_list(sourcing.and_then(|s| s.get("platforms")));
    if !platforms.is_empty() {
        let _ = writeln!(out, "\nSourcing Platforms:");
        for platform in platforms {
            let _ = writeln!(out, "  - {platform}");
        }
    }

    let questions = string_list(screening.and_then(|s| s.get("screening_questions")));
    if !questions.is_empty() {
        let _ = writeln!(out, "\nScreening Questions:");
        for (idx, question) in questions.iter().enumerate() {
            let _ = writeln!(out, "  {}. {question}", idx + 1);
        }
    }

    if let Some(letter) = result.offer_letter() {
        let _ = writeln!(out, "\nOffer Letter\n------------\n{}", letter.trim());
    }

    if !result.messages.is_empty() {
        let _ = writeln!(out, "\nSteps:");
        for message in &result.messages {
            let _ = writeln!(out, "  + {message}");
        }
    }
    if !result.errors.is_empty() {
        let _ = writeln!(out, "\nErrors:");
        for error in &result.errors {
            let _ = writeln!(out, "  x {error}");
        }
    }
    if !result.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for warning in &result.warnings {
            let _ = writeln!(out, "  ! {warning}");
        }
    }
    out
}

/// Per-agent validation status, in graph order.
pub fn render_validation(result: &WorkflowResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}\nAGENT VALIDATION REPORT\n{RULE}");
    let _ = writeln!(out, "Generated: {}", result.completed_at.format("%Y-%m-%d %H:%M:%S"));

    if result.errors.is_empty() {
        let _ = writeln!(out, "No errors detected");
    } else {
        let _ = writeln!(out, "Errors found: {}", result.errors.len());
    }

    for kind in AgentKind::ALL {
        let Some(report) = result.agent_validation.get(&kind) else {
            continue;
        };
        let status = if report.valid { "VALID" } else { "INVALID" };
        let _ = writeln!(out, "\nAgent: {}\n  Status: {status}", kind.label().to_uppercase());
        for error in &report.errors {
            let _ = writeln!(out, "  error: {error}");
        }
        for warning in &report.warnings {
            let _ = writeln!(out, "  warning: {warning}");
        }
    }

    if let Some(workflow) = &result.workflow_validation {
        let status = if workflow.valid { "VALID" } else { "INVALID" };
        let _ = writeln!(out, "\nWorkflow: {status}");
        for error in &workflow.errors {
            let _ = writeln!(out, "  error: {error}");
        }
        for warning in &workflow.warnings {
            let _ = writeln!(out, "  warning: {warning}");
        }
    }
    out
}

pub fn render_batch_summary(items: &[BatchItem]) -> String {
    let successful = items.iter().filter(|i| i.status == BatchStatus::Success).count();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Batch complete: {} processed, {successful} successful, {} failed",
        items.len(),
        items.len() - successful
    );
    for item in items {
        let title = item.config.display_title(item.batch_index);
        match (&item.result, item.status) {
            (Some(result), BatchStatus::Success) => {
                let salary = result
                    .target_salary()
                    .map(|s| format!("${}", format_thousands(s)))
                    .unwrap_or_else(|| "N/A".to_string());
                let _ = writeln!(
                    out,
                    "  [{}] {title}: {} ({salary}), {} issue(s)",
                    item.batch_index,
                    result.job_title().unwrap_or("N/A"),
                    result.errors.len()
                );
            }
            _ => {
                let _ = writeln!(
                    out,
                    "  [{}] {title}: error: {}",
                    item.batch_index,
                    item.error.as_deref().unwrap_or("Unknown error")
                );
            }
        }
    }
    out
}
