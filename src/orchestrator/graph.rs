//! Static description of the recruiting workflow as a DAG between `START` and `END`.
//!
//! The executor in `workflow` derives its scheduling from this structure, so
//! the same graph drives execution, validation and the rendered diagrams.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Write as _;

use serde::Serialize;

use crate::agents::AgentKind;
use crate::validation::ValidationReport;

pub const START: &str = "START";
pub const END: &str = "END";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub name: String,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphValidation {
    #[serde(flatten)]
    pub report: ValidationReport,
    pub node_count: usize,
    pub edge_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// parse_job fans out to sourcing, screening and compensation; the offer waits on compensation.
    pub fn recruiting() -> Self {
        let mut graph = Self::new();
        for kind in AgentKind::ALL {
            graph.add_node(kind.node_name(), kind.label(), kind.description());
        }

        let parse = AgentKind::JobParser.node_name();
        let compensation = AgentKind::Compensation.node_name();
        let offer = AgentKind::OfferLetter.node_name();

        graph.add_edge(START, parse, None);
        for branch in [AgentKind::Sourcing, AgentKind::Screening, AgentKind::Compensation] {
            graph.add_edge(parse, branch.node_name(), Some("parallel"));
        }
        graph.add_edge(compensation, offer, Some("salary + benefits"));
        graph.add_edge(AgentKind::Sourcing.node_name(), END, None);
        graph.add_edge(AgentKind::Screening.node_name(), END, None);
        graph.add_edge(offer, END, None);
        graph
    }

    pub fn add_node(&mut self, name: &str, label: &str, description: &str) -> &mut Self {
        self.nodes.push(GraphNode {
            name: name.to_string(),
            label: label.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn add_edge(&mut self, from: &str, to: &str, label: Option<&str>) -> &mut Self {
        self.edges.push(GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            label: label.map(str::to_string),
        });
        self
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    fn is_terminal(name: &str) -> bool {
        name == START || name == END
    }

    /// Direct upstream nodes, terminals excluded.
    pub fn predecessors(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|edge| edge.to == name && !Self::is_terminal(&edge.from))
            .map(|edge| edge.from.as_str())
            .collect()
    }

    /// Direct downstream nodes, terminals excluded.
    pub fn successors(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|edge| edge.from == name && !Self::is_terminal(&edge.to))
            .map(|edge| edge.to.as_str())
            .collect()
    }

    /// Every node that must finish before `name` may start.
    pub fn ancestors(&self, name: &str) -> BTreeSet<&str> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&str> = self.predecessors(name).into_iter().collect();
        while let Some(current) = queue.pop_front() {
            if seen.insert(current) {
                queue.extend(self.predecessors(current));
            }
        }
        seen
    }

    /// Topological levels: every node appears one level after its deepest predecessor.
    pub fn layers(&self) -> anyhow::Result<Vec<Vec<String>>> {
        let mut indegree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|node| (node.name.as_str(), self.predecessors(&node.name).len()))
            .collect();

        let mut current: Vec<&str> = self
            .nodes
            .iter()
            .map(|node| node.name.as_str())
            .filter(|name| indegree.get(name) == Some(&0))
            .collect();
        let mut layers = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();
            for name in &current {
                for successor in self.successors(name) {
                    if let Some(count) = indegree.get_mut(successor) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            next.push(successor);
                        }
                    }
                }
            }
            layers.push(current.iter().map(|name| name.to_string()).collect());
            current = next;
        }

        anyhow::ensure!(placed == self.nodes.len(), "Graph contains a cycle");
        Ok(layers)
    }

    fn reachable_from_start(&self) -> HashSet<&str> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = self
            .edges
            .iter()
            .filter(|edge| edge.from == START)
            .map(|edge| edge.to.as_str())
            .collect();
        while let Some(current) = queue.pop_front() {
            if seen.insert(current) {
                queue.extend(self.successors(current));
            }
        }
        seen
    }

    pub fn validate(&self) -> GraphValidation {
        let mut report = ValidationReport::passed();

        if self.nodes.is_empty() {
            report.push_error("Graph has no nodes");
        }

        let known: HashSet<&str> = self.nodes.iter().map(|node| node.name.as_str()).collect();
        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !Self::is_terminal(endpoint) && !known.contains(endpoint.as_str()) {
                    report.push_error(format!(
                        "Edge {} -> {} references unknown node '{endpoint}'",
                        edge.from, edge.to
                    ));
                }
            }
        }

        if let Err(err) = self.layers() {
            report.push_error(err.to_string());
        }

        if !self.edges.iter().any(|edge| edge.from == START) {
            report.push_warning("No explicit entry point defined");
        }
        if !self.edges.iter().any(|edge| edge.to == END) {
            report.push_warning("No nodes connect to END");
        }

        let reachable = self.reachable_from_start();
        for node in &self.nodes {
            if !reachable.contains(node.name.as_str()) {
                report.push_warning(format!("Node '{}' is not reachable from START", node.name));
            }
        }

        GraphValidation {
            report,
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
        }
    }

    pub fn plot_ascii(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "RECRUITING WORKFLOW GRAPH");
        let _ = writeln!(out, "=========================");
        let _ = writeln!(out, "[{START}]");

        let layers = match self.layers() {
            Ok(layers) => layers,
            Err(err) => {
                let _ = writeln!(out, "  (cannot lay out graph: {err})");
                return out;
            }
        };

        for layer in &layers {
            let _ = writeln!(out, "   |");
            let _ = writeln!(out, "   v");
            let parallel = layer.len() > 1;
            for name in layer {
                let label = self.node(name).map_or(name.as_str(), |node| node.label.as_str());
                let mut line = format!("  [{label}] ({name})");
                let upstream = self.predecessors(name);
                if !upstream.is_empty() {
                    let _ = write!(line, " <- {}", upstream.join(", "));
                }
                if parallel {
                    line.push_str("  || parallel");
                }
                let _ = writeln!(out, "{line}");
            }
        }

        let finishing: Vec<&str> = self
            .edges
            .iter()
            .filter(|edge| edge.to == END)
            .map(|edge| edge.from.as_str())
            .collect();
        let _ = writeln!(out, "   |");
        let _ = writeln!(out, "   v");
        let _ = writeln!(out, "[{END}] <- {}", finishing.join(", "));
        out
    }

    /// Mermaid `graph TD` source; paste into any Mermaid renderer.
    pub fn plot_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        let _ = writeln!(out, "    {START}([{START}])");
        for node in &self.nodes {
            let _ = writeln!(
                out,
                "    {}[\"{}<br/>{}\"]",
                node.name, node.label, node.description
            );
        }

        let mut end_count = 0;
        for edge in &self.edges {
            let target = if edge.to == END {
                end_count += 1;
                format!("{END}{end_count}([{END}])")
            } else {
                edge.to.clone()
            };
            match &edge.label {
                Some(label) => {
                    let _ = writeln!(out, "    {} -->|{label}| {target}", edge.from);
                }
                None => {
                    let _ = writeln!(out, "    {} --> {target}", edge.from);
                }
            }
        }

        if let Ok(layers) = self.layers() {
            let parallel: Vec<&str> = layers
                .iter()
                .filter(|layer| layer.len() > 1)
                .flatten()
                .map(String::as_str)
                .collect();
            if !parallel.is_empty() {
                let _ = writeln!(
                    out,
                    "    classDef parallel stroke-dasharray: 5 5\n    class {} parallel",
                    parallel.join(",")
                );
            }
        }
        out
    }

    /// Structure summary plus validation findings.
    pub fn report(&self) -> String {
        let validation = self.validate();
        let mut out = String::new();
        let _ = writeln!(out, "Nodes: {}", validation.node_count);
        for node in &self.nodes {
            let _ = writeln!(out, "  - {} ({}): {}", node.name, node.label, node.description);
        }
        let _ = writeln!(out, "Edges: {}", validation.edge_count);
        for edge in &self.edges {
            match &edge.label {
                Some(label) => {
                    let _ = writeln!(out, "  - {} -> {} [{label}]", edge.from, edge.to);
                }
                None => {
                    let _ = writeln!(out, "  - {} -> {}", edge.from, edge.to);
                }
            }
        }
        let status = if validation.report.valid { "VALID" } else { "INVALID" };
        let _ = writeln!(out, "Status: {status}");
        for error in &validation.report.errors {
            let _ = writeln!(out, "  error: {error}");
        }
        for warning in &validation.report.warnings {
            let _ = writeln!(out, "  warning: {warning}");
        }
        out
    }
}
