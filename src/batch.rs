//! Batch runs: many job configs through the workflow, with JSON/CSV import and export.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};

use crate::agents::RecruitingInput;
use crate::orchestrator::{RecruitingWorkflow, WorkflowResult};

pub const DEFAULT_COMPANY: &str = "Company";
pub const DEFAULT_DEPARTMENT: &str = "General";
pub const DEFAULT_MIN_SALARY: i64 = 80_000;
pub const DEFAULT_MAX_SALARY: i64 = 120_000;

pub const CSV_EXPORT_COLUMNS: [&str; 10] = [
    "Batch Index",
    "Status",
    "Job Title",
    "Experience Level",
    "Employment Type",
    "Target Salary",
    "Required Skills",
    "Company",
    "Department",
    "Error",
];

fn default_company() -> String {
    DEFAULT_COMPANY.to_string()
}

fn default_department() -> String {
    DEFAULT_DEPARTMENT.to_string()
}

fn default_min_salary() -> i64 {
    DEFAULT_MIN_SALARY
}

fn default_max_salary() -> i64 {
    DEFAULT_MAX_SALARY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    pub job_description: String,
    #[serde(default = "default_company")]
    pub company_name: String,
    #[serde(default = "default_department")]
    pub department: String,
    #[serde(default = "default_min_salary")]
    pub min_salary: i64,
    #[serde(default = "default_max_salary")]
    pub max_salary: i64,
}

impl JobConfig {
    pub fn new(job_description: impl Into<String>) -> Self {
        Self {
            job_title: None,
            job_description: job_description.into(),
            company_name: default_company(),
            department: default_department(),
            min_salary: DEFAULT_MIN_SALARY,
            max_salary: DEFAULT_MAX_SALARY,
        }
    }

    /// Label shown in progress output; falls back to `Job <n>` (1-based).
    pub fn display_title(&self, index: usize) -> String {
        self.job_title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Job {}", index + 1))
    }

    pub fn to_input(&self) -> RecruitingInput {
        RecruitingInput {
            job_description: self.job_description.clone(),
            company_name: self.company_name.clone(),
            department: self.department.clone(),
            min_salary: self.min_salary,
            max_salary: self.max_salary,
        }
    }
}

/// CSV cells may be blank; blanks take the same defaults as missing columns.
#[derive(Debug, Deserialize)]
struct CsvJobRow {
    #[serde(default)]
    job_title: Option<String>,
    #[serde(default)]
    job_description: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    min_salary: Option<String>,
    #[serde(default)]
    max_salary: Option<String>,
}

fn non_blank(cell: Option<String>) -> Option<String> {
    cell.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_salary(cell: Option<String>, default: i64, row: usize, column: &str) -> anyhow::Result<i64> {
    match non_blank(cell) {
        None => Ok(default),
        Some(raw) => {
            let digits: String = raw
                .split('.')
                .next()
                .unwrap_or_default()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '-')
                .collect();
            digits
                .parse()
                .with_context(|| format!("Row {row}: {column} '{raw}' is not a number"))
        }
    }
}

impl CsvJobRow {
    fn into_config(self, row: usize) -> anyhow::Result<JobConfig> {
        let job_description = non_blank(self.job_description)
            .with_context(|| format!("Row {row}: job_description is required"))?;
        let mut config = JobConfig::new(job_description);
        config.job_title = non_blank(self.job_title);
        if let Some(company) = non_blank(self.company_name) {
            config.company_name = company;
        }
        if let Some(department) = non_blank(self.department) {
            config.department = department;
        }
        config.min_salary = parse_salary(self.min_salary, DEFAULT_MIN_SALARY, row, "min_salary")?;
        config.max_salary = parse_salary(self.max_salary, DEFAULT_MAX_SALARY, row, "max_salary")?;
        Ok(config)
    }
}

pub fn parse_csv_configs(data: &str) -> anyhow::Result<Vec<JobConfig>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(data.as_bytes());

    let mut configs = Vec::new();
    for (idx, record) in reader.deserialize::<CsvJobRow>().enumerate() {
        // Row numbers count the header as row 1.
        let row = idx + 2;
        let record = record.with_context(|| format!("Row {row}: malformed CSV record"))?;
        configs.push(record.into_config(row)?);
    }
    Ok(configs)
}

pub fn parse_json_configs(data: &str) -> anyhow::Result<Vec<JobConfig>> {
    let value: Value = serde_json::from_str(data).context("Batch file is not valid JSON")?;
    match value {
        Value::Array(_) => serde_json::from_value(value).context("Batch JSON must be an array of job configs"),
        Value::Object(_) => Ok(vec![serde_json::from_value(value).context("Invalid job config")?]),
        _ => anyhow::bail!("Batch JSON must be an array of job configs"),
    }
}

/// Loads configs by extension: `.json` or `.csv`.
pub fn load_job_configs(path: &Path) -> anyhow::Result<Vec<JobConfig>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let configs = match extension.as_deref() {
        Some("json") => parse_json_configs(&data)?,
        Some("csv") => parse_csv_configs(&data)?,
        _ => anyhow::bail!("Unsupported batch file {}: use .json or .csv", path.display()),
    };
    info!(path = %path.display(), jobs = configs.len(), "Loaded batch configs");
    Ok(configs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub batch_index: usize,
    pub status: BatchStatus,
    pub config: JobConfig,
    pub result: Option<WorkflowResult>,
    pub error: Option<String>,
}

impl BatchItem {
    pub fn to_json(&self) -> Value {
        let mut item = Map::new();
        item.insert("batch_index".to_string(), json!(self.batch_index));
        item.insert("status".to_string(), json!(self.status));
        item.insert("config".to_string(), json!(self.config));
        match (&self.result, &self.error) {
            (Some(result), _) if self.status == BatchStatus::Success => {
                item.extend(result.artifacts());
                item.insert("messages".to_string(), json!(result.messages));
                item.insert("errors".to_string(), json!(result.errors));
                item.insert("warnings".to_string(), json!(result.warnings));
            }
            (_, error) => {
                item.insert(
                    "error".to_string(),
                    json!(error.as_deref().unwrap_or("Unknown error")),
                );
            }
        }
        Value::Object(item)
    }
}

pub struct BatchProcessor {
    workflow: Arc<RecruitingWorkflow>,
}

impl BatchProcessor {
    pub fn new(workflow: Arc<RecruitingWorkflow>) -> Self {
        Self { workflow }
    }

    /// Runs up to `concurrency` jobs at once. Results keep input order; `progress`
    /// receives `(done, total, title)` after each job.
    #[instrument(skip_all, fields(jobs = configs.len(), concurrency))]
    pub async fn process(
        &self,
        configs: Vec<JobConfig>,
        concurrency: usize,
        progress: &(dyn Fn(usize, usize, &str) + Send + Sync),
    ) -> Vec<BatchItem> {
        let total = configs.len();
        let mut items = Vec::with_capacity(total);
        let mut runs = stream::iter(configs.into_iter().enumerate())
            .map(|(batch_index, config)| async move {
                let result = self.workflow.run(config.to_input()).await;
                (batch_index, config, result)
            })
            .buffered(concurrency.max(1));

        while let Some((batch_index, config, result)) = runs.next().await {
            let item = if result.input_accepted() {
                BatchItem {
                    batch_index,
                    status: BatchStatus::Success,
                    config,
                    result: Some(result),
                    error: None,
                }
            } else {
                let error = result.errors.join("; ");
                warn!(batch_index, %error, "Batch job rejected");
                BatchItem {
                    batch_index,
                    status: BatchStatus::Error,
                    config,
                    result: None,
                    error: Some(error),
                }
            };
            progress(items.len() + 1, total, &item.config.display_title(batch_index));
            items.push(item);
        }

        info!(
            successful = items.iter().filter(|i| i.status == BatchStatus::Success).count(),
            total,
            "Batch finished"
        );
        items
    }
}

pub fn export_json(items: &[BatchItem]) -> anyhow::Result<String> {
    let successful = items.iter().filter(|i| i.status == BatchStatus::Success).count();
    let export = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "total_processed": items.len(),
        "successful": successful,
        "failed": items.len() - successful,
        "results": items.iter().map(BatchItem::to_json).collect::<Vec<_>>(),
    });
    serde_json::to_string_pretty(&export).context("Failed to serialise batch results")
}

fn text_field(map: Option<&Map<String, Value>>, key: &str) -> String {
    match map.and_then(|m| m.get(key)) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "N/A".to_string(),
        Some(other) => other.to_string(),
    }
}

fn skills_field(map: Option<&Map<String, Value>>) -> String {
    map.and_then(|m| m.get("required_skills"))
        .and_then(Value::as_array)
        .map(|skills| {
            skills
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

pub fn export_csv(items: &[BatchItem]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_EXPORT_COLUMNS)?;

    for item in items {
        let index = item.batch_index.to_string();
        let row: [String; 10] = match (&item.result, item.status) {
            (Some(result), BatchStatus::Success) => {
                let analysis = result.job_analysis();
                [
                    index,
                    "success".to_string(),
                    text_field(analysis, "job_title"),
                    text_field(analysis, "experience_level"),
                    text_field(analysis, "employment_type"),
                    result.target_salary().unwrap_or(0).to_string(),
                    skills_field(analysis),
                    item.config.company_name.clone(),
                    item.config.department.clone(),
                    String::new(),
                ]
            }
            _ => [
                index,
                "error".to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                item.error.clone().unwrap_or_else(|| "Unknown error".to_string()),
            ],
        };
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("Failed to flush CSV export: {}", err.error()))?;
    String::from_utf8(bytes).context("CSV export is not UTF-8")
}

/// Example upload file with every supported column.
pub fn csv_template() -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["job_description", "company_name", "department", "min_salary", "max_salary"])?;
    writer.write_record([
        "Senior Python Developer with 5+ years of experience in Django, REST APIs and AWS...",
        "TechCorp",
        "Engineering",
        "120000",
        "160000",
    ])?;
    writer.write_record([
        "Marketing Manager with leadership experience, brand strategy and campaign analytics...",
        "MarketCo",
        "Marketing",
        "90000",
        "130000",
    ])?;
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("Failed to flush CSV template: {}", err.error()))?;
    String::from_utf8(bytes).context("CSV template is not UTF-8")
}
