mod agents;
mod batch;
mod config;
mod documents;
mod llm_client;
mod orchestrator;
mod rag;
mod report;
mod validation;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agents::{CandidateOffer, RecruitingInput};
use anyhow::{bail, Context};
use batch::{BatchProcessor, DEFAULT_COMPANY, DEFAULT_DEPARTMENT, DEFAULT_MAX_SALARY, DEFAULT_MIN_SALARY};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::AppConfig;
use indicatif::{ProgressBar, ProgressStyle};
use llm_client::{build_llm_client, SharedLlmClient};
use orchestrator::{AnalysisOrchestrator, CandidateProfile, RecruitingWorkflow, WorkflowGraph};
use rag::{build_embeddings, build_vector_store, Collection, EmbeddingConfig, RetrievalService};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "hiretron",
    about = "Recruiting assistant: fans a job description out to LLM agents and joins the results"
)]
struct Cli {
    /// Use the echo LLM, hashing embeddings and the local store; no network access.
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct JobArgs {
    /// Job description text.
    #[arg(long, conflicts_with = "jd_file", required_unless_present = "jd_file")]
    jd: Option<String>,
    /// Read the job description from a text or PDF file.
    #[arg(long)]
    jd_file: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_COMPANY)]
    company: String,
    #[arg(long, default_value = DEFAULT_DEPARTMENT)]
    department: String,
    #[arg(long, default_value_t = DEFAULT_MIN_SALARY)]
    min_salary: i64,
    #[arg(long, default_value_t = DEFAULT_MAX_SALARY)]
    max_salary: i64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full recruiting workflow for one job.
    Run {
        #[command(flatten)]
        job: JobArgs,
        /// Write the full result as JSON to this path.
        #[arg(long)]
        json: Option<PathBuf>,
        /// Print the per-agent validation report after the summary.
        #[arg(long, default_value_t = false)]
        validation_report: bool,
    },
    /// Run the workflow for every job in a CSV or JSON file.
    Batch {
        file: PathBuf,
        #[arg(long, default_value_t = 3)]
        concurrency: usize,
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print a CSV template for batch input.
    Template,
    /// Print the workflow graph.
    Graph {
        /// Emit a Mermaid flowchart instead of the text report.
        #[arg(long, default_value_t = false, conflicts_with = "ascii")]
        mermaid: bool,
        /// Draw the execution layers as ASCII art.
        #[arg(long, default_value_t = false)]
        ascii: bool,
    },
    /// Parse a job, then build sourcing and compensation side by side.
    Analyze {
        #[command(flatten)]
        job: JobArgs,
    },
    /// Store a job description for candidate matching.
    IndexJd {
        path: PathBuf,
        /// Document id; defaults to the file stem.
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Store one or more resumes for candidate matching.
    IndexResume {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Document id; only valid with a single resume. Defaults to the file stem.
        #[arg(long)]
        id: Option<String>,
        /// Candidate name; only valid with a single resume. Defaults to the document id.
        #[arg(long)]
        name: Option<String>,
    },
    /// Rank stored resumes against a stored job, optionally screening them with the LLM.
    Match {
        jd_id: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long, default_value_t = false)]
        screen: bool,
        /// Minimum screening score counted as a pass (0-100).
        #[arg(long)]
        threshold: Option<u8>,
    },
    /// Draft an offer letter for a named candidate.
    Offer {
        #[arg(long)]
        candidate: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = DEFAULT_COMPANY)]
        company: String,
        #[arg(long)]
        salary: i64,
        #[arg(long)]
        start_date: String,
        #[arg(long)]
        benefits: Option<String>,
        #[arg(long)]
        equity: Option<String>,
    },
    /// Inspect or reset the vector store.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum StoreAction {
    Stats,
    /// List stored document ids.
    List {
        #[arg(value_enum, default_value_t = CollectionArg::Resumes)]
        collection: CollectionArg,
    },
    Clear,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionArg {
    Jobs,
    Resumes,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Jobs => Collection::JobDescriptions,
            CollectionArg::Resumes => Collection::Resumes,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env();

    match cli.command {
        Commands::Template => {
            print!("{}", batch::csv_template()?);
            return Ok(());
        }
        Commands::Graph { mermaid, ascii } => {
            let graph = WorkflowGraph::recruiting();
            if mermaid {
                println!("{}", graph.plot_mermaid());
            } else if ascii {
                println!("{}", graph.plot_ascii());
            } else {
                println!("{}", graph.report());
            }
            return Ok(());
        }
        _ => {}
    }

    config.validate(cli.offline)?;
    let llm_client =
        build_llm_client(&config, cli.offline).context("LLM client initialization failed")?;

    match cli.command {
        Commands::Run { job, json, validation_report } => {
            let input = job_input(&job, &config)?;
            run_workflow(llm_client, input, json.as_deref(), validation_report).await
        }
        Commands::Batch { file, concurrency, json, csv } => {
            run_batch(llm_client, &file, concurrency, json.as_deref(), csv.as_deref()).await
        }
        Commands::Analyze { job } => {
            let input = job_input(&job, &config)?;
            let analysis = AnalysisOrchestrator::new(llm_client).full_analysis(input).await;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(())
        }
        Commands::IndexJd { path, id, title } => {
            let service = retrieval_service(&config, cli.offline).await?;
            let text = documents::extract_text(&path, config.max_file_bytes())?;
            let id = id.unwrap_or_else(|| documents::document_id(&path));
            let mut metadata = source_metadata(&path);
            if let Some(title) = title {
                metadata.insert("title".to_string(), Value::String(title));
            }
            service.index_job_description(&id, &text, metadata).await?;
            println!("Indexed job description {id} ({} chars)", text.chars().count());
            Ok(())
        }
        Commands::IndexResume { paths, id, name } => {
            if paths.len() > 1 && (id.is_some() || name.is_some()) {
                bail!("--id and --name apply to a single resume");
            }
            let service = retrieval_service(&config, cli.offline).await?;
            if let [path] = paths.as_slice() {
                let text = documents::extract_text(path, config.max_file_bytes())?;
                let id = id.unwrap_or_else(|| documents::document_id(path));
                let mut metadata = source_metadata(path);
                metadata.insert("name".to_string(), Value::String(name.unwrap_or_else(|| id.clone())));
                service.index_resume(&id, &text, metadata).await?;
                println!("Indexed resume {id} ({} chars)", text.chars().count());
                return Ok(());
            }

            let mut resumes = Vec::with_capacity(paths.len());
            for path in &paths {
                match documents::extract_text(path, config.max_file_bytes()) {
                    Ok(text) => {
                        let id = documents::document_id(path);
                        let mut metadata = source_metadata(path);
                        metadata.insert("name".to_string(), Value::String(id.clone()));
                        resumes.push((id, text, metadata));
                    }
                    Err(err) => warn!(path = %path.display(), ?err, "Skipping unreadable resume"),
                }
            }
            let stored = service.index_resumes(resumes).await?;
            println!("Indexed {stored} of {} resume(s)", paths.len());
            Ok(())
        }
        Commands::Match { jd_id, top_k, screen, threshold } => {
            let service = retrieval_service(&config, cli.offline).await?;
            let top_k = top_k.unwrap_or(config.top_k);
            let threshold = threshold.unwrap_or(config.pass_threshold).min(100);
            run_match(&service, llm_client, &jd_id, top_k, screen, threshold).await
        }
        Commands::Offer {
            candidate,
            title,
            company,
            salary,
            start_date,
            benefits,
            equity,
        } => {
            let offer = CandidateOffer {
                candidate_name: candidate,
                job_title: title,
                company_name: company,
                salary,
                start_date,
                benefits,
                equity,
            };
            let letter = AnalysisOrchestrator::new(llm_client).draft_offer(&offer).await?;
            println!("{letter}");
            Ok(())
        }
        Commands::Store { action } => {
            let service = retrieval_service(&config, cli.offline).await?;
            match action {
                StoreAction::Stats => {
                    let stats = service.stats().await?;
                    println!(
                        "{}: {}\n{}: {}",
                        Collection::JobDescriptions,
                        stats.job_descriptions,
                        Collection::Resumes,
                        stats.resumes
                    );
                }
                StoreAction::List { collection } => {
                    let collection = Collection::from(collection);
                    let documents = service.list_documents(collection).await?;
                    println!("{collection}: {}", documents.len());
                    for document in documents {
                        let name = candidate_name(&document.metadata, &document.id);
                        println!("  {} ({name}, {} chars)", document.id, document.text.chars().count());
                    }
                }
                StoreAction::Clear => {
                    for collection in Collection::ALL {
                        service.store().clear(collection).await?;
                    }
                    println!("Vector store cleared");
                }
            }
            Ok(())
        }
        Commands::Template | Commands::Graph { .. } => Ok(()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

fn job_input(job: &JobArgs, config: &AppConfig) -> anyhow::Result<RecruitingInput> {
    let job_description = match (&job.jd, &job.jd_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => documents::extract_text(path, config.max_file_bytes())?,
        (None, None) => bail!("Provide --jd or --jd-file"),
    };
    Ok(RecruitingInput {
        job_description,
        company_name: job.company.clone(),
        department: job.department.clone(),
        min_salary: job.min_salary,
        max_salary: job.max_salary,
    })
}

async fn retrieval_service(config: &AppConfig, offline: bool) -> anyhow::Result<RetrievalService> {
    let store = build_vector_store(config, offline)
        .await
        .context("Vector store initialization failed")?;
    let embeddings = build_embeddings(&EmbeddingConfig::from_app(config), offline)
        .context("Embeddings initialization failed")?;
    Ok(RetrievalService::new(store, embeddings))
}

fn source_metadata(path: &Path) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("source".to_string(), Value::String(path.display().to_string()));
    metadata.insert("indexed_at".to_string(), Value::String(Utc::now().to_rfc3339()));
    metadata
}

async fn run_workflow(
    llm_client: SharedLlmClient,
    input: RecruitingInput,
    json_out: Option<&Path>,
    validation_report: bool,
) -> anyhow::Result<()> {
    let workflow = RecruitingWorkflow::new(llm_client)?;
    let result = workflow.run(input).await;

    println!("{}", report::render_workflow(&result));
    if validation_report && result.input_accepted() {
        println!("{}", report::render_validation(&result));
    }

    if let Some(path) = json_out {
        let body = serde_json::to_string_pretty(&result)?;
        fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Workflow result written");
    }

    if !result.input_accepted() {
        bail!("Job input rejected: {}", result.errors.join("; "));
    }
    Ok(())
}

async fn run_batch(
    llm_client: SharedLlmClient,
    file: &Path,
    concurrency: usize,
    json_out: Option<&Path>,
    csv_out: Option<&Path>,
) -> anyhow::Result<()> {
    let configs = batch::load_job_configs(file)?;
    if configs.is_empty() {
        bail!("No jobs found in {}", file.display());
    }

    let bar = ProgressBar::new(configs.len() as u64);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(err) => warn!(?err, "Invalid progress template; using default bar"),
    }

    let processor = BatchProcessor::new(Arc::new(RecruitingWorkflow::new(llm_client)?));
    let progress = |done: usize, _total: usize, title: &str| {
        bar.set_position(done as u64);
        bar.set_message(title.to_string());
    };
    let items = processor.process(configs, concurrency, &progress).await;
    bar.finish_with_message("done");

    println!("{}", report::render_batch_summary(&items));

    if let Some(path) = json_out {
        fs::write(path, batch::export_json(&items)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("JSON results written to {}", path.display());
    }
    if let Some(path) = csv_out {
        fs::write(path, batch::export_csv(&items)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("CSV results written to {}", path.display());
    }
    Ok(())
}

async fn run_match(
    service: &RetrievalService,
    llm_client: SharedLlmClient,
    jd_id: &str,
    top_k: usize,
    screen: bool,
    threshold: u8,
) -> anyhow::Result<()> {
    let Some(jd_text) = service.job_description_text(jd_id).await? else {
        bail!("Job description {jd_id} is not indexed");
    };
    let candidates = service.retrieve_candidates_for_job(jd_id, top_k).await?;
    if candidates.is_empty() {
        println!("No resumes indexed yet");
        return Ok(());
    }

    println!("Top {} candidate(s) for {jd_id}:", candidates.len());
    for (rank, candidate) in candidates.iter().enumerate() {
        println!(
            "  {}. {} ({}) similarity {:.3}",
            rank + 1,
            candidate_name(&candidate.metadata, &candidate.resume_id),
            candidate.resume_id,
            candidate.similarity_score
        );
    }

    if !screen {
        return Ok(());
    }

    let profiles = candidates
        .into_iter()
        .map(|candidate| CandidateProfile {
            name: candidate_name(&candidate.metadata, &candidate.resume_id),
            id: candidate.resume_id,
            resume_text: candidate.resume_text,
        })
        .collect();
    let screened = AnalysisOrchestrator::new(llm_client)
        .screen_candidates(&jd_text, profiles, None)
        .await;

    println!("\nScreening (pass threshold {threshold}):");
    let mut passed = 0usize;
    for entry in &screened {
        let verdict = &entry.screening;
        let status = if verdict.passes(threshold) {
            passed += 1;
            "PASS"
        } else {
            "FAIL"
        };
        println!(
            "  {} [{status}] score {} {}: {}",
            entry.candidate.name, verdict.score, verdict.recommendation, verdict.reasoning
        );
    }
    println!("{passed} of {} candidate(s) passed", screened.len());
    println!(
        "{}",
        json!({"jd_id": jd_id, "screened": screened.len(), "passed": passed, "threshold": threshold})
    );
    Ok(())
}

fn candidate_name(metadata: &Map<String, Value>, fallback: &str) -> String {
    metadata
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(fallback)
        .to_string()
}
