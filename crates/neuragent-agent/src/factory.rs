use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use neuragent_core::error::{AgentError, Result};
use neuragent_core::state::{ErrorRecord, WorkflowState};
use neuragent_core::traits::{CompletionService, FileStore, SearchService};
use neuragent_core::types::Role;

use crate::graph::{RunLimits, RunOutcome, WorkflowGraph};
use crate::workflows::executor::{executor_graph, ExecutorState};
use crate::workflows::researcher::{researcher_graph, ResearcherState};

/// Reply text when a run produced no assistant message.
pub const NO_RESPONSE: &str = "No response generated.";

/// Reply text when a research run produced no assistant message.
pub const NO_RESULTS: &str = "No results found.";

/// Available workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Researcher,
    Executor,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Researcher => "researcher",
            AgentKind::Executor => "executor",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "researcher" => Ok(AgentKind::Researcher),
            "executor" => Ok(AgentKind::Executor),
            other => Err(AgentError::Validation(format!(
                "Unknown agent type: {}",
                other
            ))),
        }
    }
}

/// What a caller gets back from a run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub agent_type: AgentKind,
    /// Last assistant message of the run.
    pub result: String,
    /// Latest output value of each node.
    pub node_outputs: serde_json::Map<String, serde_json::Value>,
    pub errors: Vec<ErrorRecord>,
    /// Per-topic findings; researcher runs only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_findings: Option<String>,
    /// Executed node ids in order.
    pub steps: Vec<String>,
}

/// Builds each workflow once and runs it on fresh state per request.
pub struct AgentFactory {
    researcher: WorkflowGraph<ResearcherState>,
    executor: WorkflowGraph<ExecutorState>,
    limits: RunLimits,
}

impl AgentFactory {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        search: Arc<dyn SearchService>,
        files: Arc<dyn FileStore>,
        limits: RunLimits,
    ) -> Result<Self> {
        Ok(Self {
            researcher: researcher_graph(llm.clone(), search)?,
            executor: executor_graph(llm, files)?,
            limits,
        })
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// Run `kind` on `query`. `context`, when present, is added to the
    /// conversation as a system message after the query. See [`Self::research`]
    /// for the context-first variant.
    pub async fn run(&self, kind: AgentKind, query: &str, context: Option<&str>) -> Result<AgentReply> {
        info!(agent_type = %kind, "Running agent workflow");
        match kind {
            AgentKind::Researcher => {
                let mut state = ResearcherState::new();
                seed(&mut state, query, context);
                let outcome = self.researcher.invoke(state, &self.limits).await?;
                let findings = outcome.state.detailed_findings();
                Ok(reply(kind, outcome, Some(findings), NO_RESPONSE))
            }
            AgentKind::Executor => {
                let mut state = ExecutorState::new();
                seed(&mut state, query, context);
                let outcome = self.executor.invoke(state, &self.limits).await?;
                Ok(reply(kind, outcome, None, NO_RESPONSE))
            }
        }
    }

    /// Run the researcher with `context` placed ahead of the query.
    pub async fn research(&self, query: &str, context: Option<&str>) -> Result<AgentReply> {
        info!("Running research workflow");
        let mut state = ResearcherState::new();
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            state.agent.add_message(Role::System, ctx);
        }
        state.agent.add_message(Role::User, query);
        let outcome = self.researcher.invoke(state, &self.limits).await?;
        let findings = outcome.state.detailed_findings();
        Ok(reply(AgentKind::Researcher, outcome, Some(findings), NO_RESULTS))
    }

    /// Graphviz rendering of a workflow.
    pub fn graph_dot(&self, kind: AgentKind, layout: &str) -> String {
        match kind {
            AgentKind::Researcher => self.researcher.to_dot(layout),
            AgentKind::Executor => self.executor.to_dot(layout),
        }
    }
}

fn seed<S: WorkflowState>(state: &mut S, query: &str, context: Option<&str>) {
    let agent = state.agent_mut();
    agent.add_message(Role::User, query);
    if let Some(ctx) = context.filter(|c| !c.is_empty()) {
        agent.add_message(Role::System, ctx);
    }
}

fn reply<S: WorkflowState>(
    kind: AgentKind,
    outcome: RunOutcome<S>,
    detailed_findings: Option<String>,
    fallback: &str,
) -> AgentReply {
    let agent = outcome.state.agent();
    AgentReply {
        agent_type: kind,
        result: agent
            .thread()
            .last_content(Role::Assistant)
            .unwrap_or(fallback)
            .to_string(),
        node_outputs: agent.output_values(),
        errors: agent.errors().to_vec(),
        detailed_findings,
        steps: outcome.steps.iter().map(|s| s.node_id.clone()).collect(),
    }
}
