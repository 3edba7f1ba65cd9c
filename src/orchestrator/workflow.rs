use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::task::{Id as TaskId, JoinSet};
use tracing::{info, instrument, warn};

use crate::agents::{
    salary_value, AgentBehavior, AgentKind, AgentOutput, AgentRequest, AgentResponse,
    CompensationAgent, JobParserAgent, OfferLetterAgent, RecruitingInput, ScreeningAgent,
    SourcingAgent,
};
use crate::llm_client::SharedLlmClient;
use crate::validation::{validate_input, validate_workflow, ValidationReport};

use super::graph::WorkflowGraph;

type AgentHandle = Arc<dyn AgentBehavior>;

/// Everything one run produced, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub input: RecruitingInput,
    pub outputs: BTreeMap<AgentKind, AgentOutput>,
    /// Agent progress notes in completion order.
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub input_validation: ValidationReport,
    pub agent_validation: BTreeMap<AgentKind, ValidationReport>,
    /// `None` when the input was rejected and no agent ran.
    pub workflow_validation: Option<ValidationReport>,
    pub completed_at: DateTime<Utc>,
}

impl WorkflowResult {
    fn rejected(input: RecruitingInput, input_validation: ValidationReport) -> Self {
        Self {
            input,
            outputs: BTreeMap::new(),
            messages: Vec::new(),
            errors: input_validation.errors.clone(),
            warnings: input_validation.warnings.clone(),
            input_validation,
            agent_validation: BTreeMap::new(),
            workflow_validation: None,
            completed_at: Utc::now(),
        }
    }

    pub fn object(&self, kind: AgentKind) -> Option<&Map<String, Value>> {
        self.outputs.get(&kind).and_then(AgentOutput::as_object)
    }

    pub fn job_analysis(&self) -> Option<&Map<String, Value>> {
        self.object(AgentKind::JobParser)
    }

    pub fn sourcing_strategy(&self) -> Option<&Map<String, Value>> {
        self.object(AgentKind::Sourcing)
    }

    pub fn screening_criteria(&self) -> Option<&Map<String, Value>> {
        self.object(AgentKind::Screening)
    }

    pub fn compensation_package(&self) -> Option<&Map<String, Value>> {
        self.object(AgentKind::Compensation)
    }

    pub fn offer_letter(&self) -> Option<&str> {
        self.outputs
            .get(&AgentKind::OfferLetter)
            .and_then(AgentOutput::as_text)
    }

    pub fn job_title(&self) -> Option<&str> {
        self.job_analysis()
            .and_then(|analysis| analysis.get("job_title"))
            .and_then(Value::as_str)
    }

    pub fn target_salary(&self) -> Option<i64> {
        self.compensation_package()
            .and_then(|package| package.get("target_salary"))
            .and_then(salary_value)
    }

    pub fn input_accepted(&self) -> bool {
        self.input_validation.valid
    }

    /// Results keyed the way exports expect (`job_analysis`, `offer_letter`, ...).
    pub fn artifacts(&self) -> Map<String, Value> {
        self.outputs
            .iter()
            .map(|(kind, output)| (kind.result_key().to_string(), output.to_value()))
            .collect()
    }
}

/// Runs the recruiting graph: each node starts as soon as all of its predecessors finished.
pub struct RecruitingWorkflow {
    graph: WorkflowGraph,
    agents: HashMap<String, AgentHandle>,
}

impl RecruitingWorkflow {
    pub fn new(llm_client: SharedLlmClient) -> anyhow::Result<Self> {
        let agents: Vec<AgentHandle> = vec![
            Arc::new(JobParserAgent::new(llm_client.clone())),
            Arc::new(SourcingAgent::new(llm_client.clone())),
            Arc::new(ScreeningAgent::new(llm_client.clone())),
            Arc::new(CompensationAgent::new(llm_client.clone())),
            Arc::new(OfferLetterAgent::new(llm_client)),
        ];
        Self::with_graph(WorkflowGraph::recruiting(), agents)
    }

    /// Custom graph; every node must be backed by an agent whose node name matches.
    pub fn with_graph(graph: WorkflowGraph, agents: Vec<AgentHandle>) -> anyhow::Result<Self> {
        let validation = graph.validate();
        anyhow::ensure!(
            validation.report.valid,
            "Invalid workflow graph: {}",
            validation.report.errors.join("; ")
        );

        let agents: HashMap<String, AgentHandle> = agents
            .into_iter()
            .map(|agent| (agent.kind().node_name().to_string(), agent))
            .collect();
        for node in graph.nodes() {
            anyhow::ensure!(
                agents.contains_key(&node.name),
                "No agent registered for node '{}'",
                node.name
            );
        }
        Ok(Self { graph, agents })
    }

    #[instrument(skip_all, fields(company = %input.company_name))]
    pub async fn run(&self, input: RecruitingInput) -> WorkflowResult {
        let input_validation = validate_input(&input);
        if !input_validation.valid {
            warn!(errors = ?input_validation.errors, "Input rejected, no agents run");
            return WorkflowResult::rejected(input, input_validation);
        }

        let mut result = WorkflowResult {
            input: input.clone(),
            outputs: BTreeMap::new(),
            messages: Vec::new(),
            errors: Vec::new(),
            warnings: input_validation.warnings.clone(),
            input_validation,
            agent_validation: BTreeMap::new(),
            workflow_validation: None,
            completed_at: Utc::now(),
        };

        let mut finished: HashSet<String> = HashSet::new();
        let mut started: HashSet<String> = HashSet::new();
        let mut tasks: JoinSet<(String, anyhow::Result<AgentResponse>)> = JoinSet::new();
        let mut running: HashMap<TaskId, String> = HashMap::new();

        self.spawn_ready(&mut tasks, &mut running, &mut started, &finished, &result);

        while let Some(joined) = tasks.join_next_with_id().await {
            let (node, outcome) = match joined {
                Ok((id, pair)) => {
                    running.remove(&id);
                    pair
                }
                Err(err) => {
                    // A panicked agent leaves its node unfinished; dependents never start.
                    let node = running
                        .remove(&err.id())
                        .unwrap_or_else(|| "unknown agent".to_string());
                    warn!(node = %node, ?err, "Agent task aborted");
                    result.errors.push(format!("{node}: agent task aborted: {err}"));
                    continue;
                }
            };

            match outcome {
                Ok(response) => self.record(&mut result, response),
                Err(err) => {
                    warn!(node = %node, ?err, "Agent failed");
                    result.errors.push(format!("{node}: {err:#}"));
                }
            }

            finished.insert(node);
            self.spawn_ready(&mut tasks, &mut running, &mut started, &finished, &result);
        }

        let workflow_validation = validate_workflow(&result.outputs);
        info!(
            agents = result.outputs.len(),
            errors = result.errors.len(),
            valid = workflow_validation.valid,
            "Recruiting workflow finished"
        );
        result.workflow_validation = Some(workflow_validation);
        result.completed_at = Utc::now();
        result
    }

    fn record(&self, result: &mut WorkflowResult, response: AgentResponse) {
        info!(agent = response.kind.label(), fallback = response.fallback_used, "{}", response.message);
        result.messages.push(response.message);
        result.errors.extend(response.validation.errors.iter().cloned());
        result.warnings.extend(response.validation.warnings.iter().cloned());
        result.agent_validation.insert(response.kind, response.validation);
        result.outputs.insert(response.kind, response.output);
    }

    fn spawn_ready(
        &self,
        tasks: &mut JoinSet<(String, anyhow::Result<AgentResponse>)>,
        running: &mut HashMap<TaskId, String>,
        started: &mut HashSet<String>,
        finished: &HashSet<String>,
        state: &WorkflowResult,
    ) {
        for node in self.graph.nodes() {
            if started.contains(&node.name) {
                continue;
            }
            let ready = self
                .graph
                .predecessors(&node.name)
                .iter()
                .all(|upstream| finished.contains(*upstream));
            if !ready {
                continue;
            }
            let Some(agent) = self.agents.get(&node.name).cloned() else {
                continue;
            };

            let request = self.request_for(&node.name, state);
            let name = node.name.clone();
            started.insert(name.clone());
            running.insert(
                tasks
                    .spawn(async move {
                        let outcome = agent.handle(request).await;
                        (name, outcome)
                    })
                    .id(),
                node.name.clone(),
            );
        }
    }

    /// Builds the request from the outputs of `node`'s ancestors only.
    fn request_for(&self, node: &str, state: &WorkflowResult) -> AgentRequest {
        let ancestors = self.graph.ancestors(node);
        let upstream = |kind: AgentKind| {
            ancestors
                .contains(kind.node_name())
                .then(|| state.object(kind).cloned())
                .flatten()
        };

        let mut request = AgentRequest::new(state.input.clone());
        request.job_analysis = upstream(AgentKind::JobParser);
        request.compensation_package = upstream(AgentKind::Compensation);
        request
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm_client::testing::ScriptedLlmClient;
    use crate::llm_client::EchoLlmClient;

    const PARSE_REPLY: &str = r#"{"job_title":"Senior Python Developer","experience_level":"5+ years",
        "employment_type":"Full-time","required_skills":["Python","Django"],
        "responsibilities":["Build APIs"],"qualifications":["BSc"]}"#;
    const SOURCING_REPLY: &str = r#"{"platforms":[{"name":"LinkedIn","reason":"reach"}],
        "search_keywords":["django"],"outreach_strategy":"InMail","timeline":"4 weeks"}"#;
    const SCREENING_REPLY: &str = r#"{"must_have_criteria":["Django"],
        "screening_questions":["Describe an ORM optimisation","How do you deploy?"]}"#;
    const COMPENSATION_REPLY: &str = r#"{"target_salary":140000,"benefits_package":["Health","401k"]}"#;

    fn scripted() -> ScriptedLlmClient {
        ScriptedLlmClient::new()
            .reply("parsing job descriptions", PARSE_REPLY)
            .reply("talent acquisition", SOURCING_REPLY)
            .reply("HR interviewer", SCREENING_REPLY)
            .reply("compensation analyst", COMPENSATION_REPLY)
            .reply("creating offer letters", "Dear Candidate, we are delighted. ".repeat(10))
    }

    fn input() -> RecruitingInput {
        RecruitingInput {
            job_description: "Senior Python Developer with 5+ years of experience building Django APIs on AWS."
                .to_string(),
            company_name: "TechCorp Inc.".to_string(),
            department: "Engineering".to_string(),
            min_salary: 120_000,
            max_salary: 160_000,
        }
    }

    #[tokio::test]
    async fn runs_every_agent_and_threads_state() {
        let llm = scripted().shared();
        let workflow = RecruitingWorkflow::new(llm.clone()).expect("workflow");
        let result = workflow.run(input()).await;

        assert_eq!(result.outputs.len(), 5);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.workflow_validation.as_ref().map(|v| v.valid), Some(true));
        assert_eq!(result.job_title(), Some("Senior Python Developer"));
        assert_eq!(result.target_salary(), Some(140_000));
        assert_eq!(result.messages.len(), 5);
        assert_eq!(result.messages[0], "Job Parser completed: Senior Python Developer");

        let offer_call = llm
            .calls()
            .into_iter()
            .find(|call| call.system.contains("creating offer letters"))
            .expect("offer call");
        assert!(offer_call.user.contains("Job Title: Senior Python Developer"));
        assert!(offer_call.user.contains("Salary: $140,000"));
        assert!(offer_call.user.contains("Benefits: Health, 401k"));

        let artifacts = result.artifacts();
        assert!(artifacts.contains_key("sourcing_strategy"));
        assert!(artifacts["offer_letter"].is_string());
    }

    #[tokio::test]
    async fn rejected_input_makes_no_llm_calls() {
        let llm = scripted().shared();
        let workflow = RecruitingWorkflow::new(llm.clone()).expect("workflow");
        let result = workflow
            .run(RecruitingInput {
                job_description: "Too short".to_string(),
                ..input()
            })
            .await;

        assert!(!result.input_accepted());
        assert!(result.outputs.is_empty());
        assert!(result.workflow_validation.is_none());
        assert!(result.errors[0].contains("at least 50"));
        assert!(llm.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn independent_branches_run_concurrently() {
        let llm = scripted().with_delay(Duration::from_secs(1)).shared();
        let workflow = RecruitingWorkflow::new(llm.clone()).expect("workflow");

        let started = tokio::time::Instant::now();
        let result = workflow.run(input()).await;
        let elapsed = started.elapsed();

        assert_eq!(result.outputs.len(), 5);
        // parse -> compensation -> offer is the critical path.
        assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
    }

    #[tokio::test]
    async fn offline_run_falls_back_everywhere_but_completes() {
        let workflow = RecruitingWorkflow::new(EchoLlmClient::shared()).expect("workflow");
        let result = workflow.run(input()).await;

        assert_eq!(result.outputs.len(), 5);
        assert_eq!(result.job_title(), Some("Software Engineer"));
        assert_eq!(result.target_salary(), Some(140_000));
        assert!(result
            .errors
            .contains(&"Job Parser: Failed to parse LLM response".to_string()));
        let workflow_validation = result.workflow_validation.as_ref().expect("ran");
        assert!(!workflow_validation.valid);
        assert!(workflow_validation
            .errors
            .iter()
            .any(|e| e.starts_with("analyze_compensation reported error")));
        assert!(result.offer_letter().unwrap_or_default().contains("[offline response]"));
    }

    #[tokio::test]
    async fn custom_graph_requires_agents_for_every_node() {
        let graph = WorkflowGraph::recruiting();
        let llm: SharedLlmClient = scripted().shared();
        let only_parser: Vec<AgentHandle> = vec![Arc::new(JobParserAgent::new(llm))];
        let err = RecruitingWorkflow::with_graph(graph, only_parser)
            .err()
            .expect("missing agents");
        assert!(err.to_string().contains("No agent registered"));
    }

    struct ExplodingAgent;

    #[async_trait::async_trait]
    impl AgentBehavior for ExplodingAgent {
        fn kind(&self) -> AgentKind {
            AgentKind::Compensation
        }

        async fn handle(&self, _request: AgentRequest) -> anyhow::Result<AgentResponse> {
            panic!("compensation model exploded");
        }
    }

    #[tokio::test]
    async fn panicked_agent_is_named_and_blocks_its_dependents() {
        let llm: SharedLlmClient = scripted().shared();
        let agents: Vec<AgentHandle> = vec![
            Arc::new(JobParserAgent::new(llm.clone())),
            Arc::new(SourcingAgent::new(llm.clone())),
            Arc::new(ScreeningAgent::new(llm.clone())),
            Arc::new(ExplodingAgent),
            Arc::new(OfferLetterAgent::new(llm)),
        ];
        let workflow =
            RecruitingWorkflow::with_graph(WorkflowGraph::recruiting(), agents).expect("workflow");
        let result = workflow.run(input()).await;

        assert_eq!(result.outputs.len(), 3);
        assert!(result.compensation_package().is_none());
        assert!(result.offer_letter().is_none());
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.starts_with("analyze_compensation: agent task aborted")),
            "{:?}",
            result.errors
        );
        let workflow_validation = result.workflow_validation.as_ref().expect("ran");
        assert!(workflow_validation
            .errors
            .contains(&"Missing results from agents: analyze_compensation, generate_offer".to_string()));
    }

    #[tokio::test]
    async fn extreme_budget_completes_every_agent() {
        let workflow = RecruitingWorkflow::new(EchoLlmClient::shared()).expect("workflow");
        let result = workflow
            .run(RecruitingInput {
                min_salary: i64::MAX - 10,
                max_salary: i64::MAX,
                ..input()
            })
            .await;

        assert!(result.input_accepted());
        assert_eq!(result.outputs.len(), 5);
        assert_eq!(result.target_salary(), Some(i64::MAX - 5));
        assert!(result.offer_letter().is_some());
        assert!(!result.errors.iter().any(|e| e.contains("aborted")));
    }
}
