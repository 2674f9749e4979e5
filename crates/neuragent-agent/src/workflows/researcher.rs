use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, error, info, warn};

use neuragent_core::error::Result;
use neuragent_core::state::{AgentState, NodeStatus, WorkflowState};
use neuragent_core::traits::{CompletionService, SearchService};
use neuragent_core::types::{ChatMessage, Role};
use neuragent_tools::format_hits;

use super::{build_request, latest_query, nonempty_lines};
use crate::graph::{Node, Target, WorkflowGraph};

pub const IDENTIFY_TOPICS: &str = "identify_research_topics";
pub const RESEARCH_TOPICS: &str = "research_topics";
pub const CREATE_SUMMARY: &str = "create_summary";
/// Router label for a finished run.
pub const ROUTE_END: &str = "end";

/// Hits requested per topic.
const SEARCH_LIMIT: usize = 3;

const SYSTEM_PROMPT: &str = "You are an expert researcher. Your job is to gather information on \
topics and synthesize it into clear, concise summaries.

When given a topic:
1. Break it down into 3-5 subtopics or aspects to research
2. For each subtopic, use the web search results provided to find information
3. Synthesize the information into a concise summary for each subtopic
4. Finally, create an overall summary that integrates all your findings

Be thorough, accurate, and focus on factual information rather than opinions or speculation.";

/// State of a research run.
#[derive(Debug, Clone, Default)]
pub struct ResearcherState {
    pub agent: AgentState,
    topics: Vec<String>,
    findings: HashMap<String, String>,
    summary: Option<String>,
}

impl ResearcherState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic unless an identical one is already listed.
    pub fn add_topic(&mut self, topic: impl Into<String>) -> bool {
        let topic = topic.into();
        if self.topics.contains(&topic) {
            return false;
        }
        self.topics.push(topic);
        true
    }

    pub fn add_finding(&mut self, topic: impl Into<String>, finding: impl Into<String>) {
        self.findings.insert(topic.into(), finding.into());
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn finding(&self, topic: &str) -> Option<&str> {
        self.findings.get(topic).map(String::as_str)
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Topics without a recorded finding, in listing order.
    pub fn pending_topics(&self) -> Vec<String> {
        self.topics
            .iter()
            .filter(|t| !self.findings.contains_key(*t))
            .cloned()
            .collect()
    }

    fn researched(&self) -> impl Iterator<Item = (&str, &str)> {
        self.topics
            .iter()
            .filter_map(|t| self.findings.get(t).map(|f| (t.as_str(), f.as_str())))
    }

    /// Findings rendered as markdown sections, in topic order.
    pub fn detailed_findings(&self) -> String {
        self.researched()
            .map(|(topic, finding)| format!("# {}\n\n{}", topic, finding))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl WorkflowState for ResearcherState {
    fn agent(&self) -> &AgentState {
        &self.agent
    }

    fn agent_mut(&mut self) -> &mut AgentState {
        &mut self.agent
    }
}

/// Route a research run. Checked in order: no topics yet, unresearched
/// topics, missing summary.
pub fn decide_next_step(state: &ResearcherState) -> &'static str {
    if state.topics.is_empty() {
        IDENTIFY_TOPICS
    } else if state.topics.iter().any(|t| !state.findings.contains_key(t)) {
        RESEARCH_TOPICS
    } else if !state.findings.is_empty() && state.summary.is_none() {
        CREATE_SUMMARY
    } else {
        ROUTE_END
    }
}

/// Asks the model to break the query into subtopics.
pub struct IdentifyTopics {
    llm: Arc<dyn CompletionService>,
}

impl IdentifyTopics {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }
}

impl Node<ResearcherState> for IdentifyTopics {
    fn run<'a>(&'a self, state: &'a mut ResearcherState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!("Identifying research topics");
            let query = latest_query(state.agent.thread())?;
            let request = build_request(
                SYSTEM_PROMPT,
                state.agent.thread(),
                format!(
                    "I need to research the following topic: {}\n\n\
                     What are 3-5 specific subtopics or aspects I should research about this? \
                     List each one on a separate line.",
                    query
                ),
            );

            let reply = self.llm.complete(request).await?;
            let added = nonempty_lines(&reply)
                .into_iter()
                .filter(|t| state.add_topic(t.clone()))
                .count();
            debug!(added, total = state.topics.len(), "Research topics identified");

            let output = json!(state.topics);
            state
                .agent
                .record_output(IDENTIFY_TOPICS, output, NodeStatus::Completed, None);
            Ok(())
        })
    }
}

/// Searches and synthesizes a finding for every pending topic.
pub struct ResearchTopics {
    llm: Arc<dyn CompletionService>,
    search: Arc<dyn SearchService>,
}

impl ResearchTopics {
    pub fn new(llm: Arc<dyn CompletionService>, search: Arc<dyn SearchService>) -> Self {
        Self { llm, search }
    }
}

impl Node<ResearcherState> for ResearchTopics {
    fn run<'a>(&'a self, state: &'a mut ResearcherState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let pending = state.pending_topics();
            if pending.is_empty() {
                debug!("No pending research topics");
                return Ok(());
            }
            info!(count = pending.len(), engine = self.search.engine(), "Researching topics");

            for topic in pending {
                let results = match self.search.search(&topic, SEARCH_LIMIT).await {
                    Ok(hits) => format_hits(&hits),
                    Err(e) => {
                        warn!(topic = %topic, error = %e, "Search failed");
                        format!("Search failed: {}", e)
                    }
                };

                let request = vec![
                    ChatMessage::system(SYSTEM_PROMPT),
                    ChatMessage::user(format!(
                        "Research subtopic: {}\n\nSearch results:\n{}\n\n\
                         Synthesize this information into a concise paragraph.",
                        topic, results
                    )),
                ];

                let finding = match self.llm.complete(request).await {
                    Ok(text) => text,
                    Err(e) => {
                        error!(topic = %topic, error = %e, "Research synthesis failed");
                        state.agent.record_error(
                            RESEARCH_TOPICS,
                            format!("Research failed for '{}': {}", topic, e),
                            Some(json!({ "topic": topic })),
                        );
                        format!("Research failed: {}", e)
                    }
                };
                state.add_finding(topic, finding);
            }

            let output = json!(state.researched().map(|(t, _)| t).collect::<Vec<_>>());
            state
                .agent
                .record_output(RESEARCH_TOPICS, output, NodeStatus::Completed, None);
            Ok(())
        })
    }
}

/// Synthesizes all findings into the final answer.
pub struct CreateSummary {
    llm: Arc<dyn CompletionService>,
}

impl CreateSummary {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }
}

impl Node<ResearcherState> for CreateSummary {
    fn run<'a>(&'a self, state: &'a mut ResearcherState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if state.summary.is_some() {
                debug!("Summary already present");
                return Ok(());
            }
            info!("Creating research summary");

            let findings_text: String = state
                .researched()
                .map(|(topic, finding)| format!("## {}\n\n{}\n\n", topic, finding))
                .collect();
            let request = vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Based on the following research findings, create a comprehensive summary:\n\n{}",
                    findings_text
                )),
            ];

            let summary = self.llm.complete(request).await?;
            state.set_summary(summary.clone());
            state.agent.add_message(Role::Assistant, summary.clone());
            state.agent.record_output(
                CREATE_SUMMARY,
                json!(summary),
                NodeStatus::Completed,
                None,
            );
            Ok(())
        })
    }
}

/// Identify, then research until every topic has a finding, then summarize.
pub fn researcher_graph(
    llm: Arc<dyn CompletionService>,
    search: Arc<dyn SearchService>,
) -> Result<WorkflowGraph<ResearcherState>> {
    WorkflowGraph::builder(IDENTIFY_TOPICS)
        .node(IDENTIFY_TOPICS, IdentifyTopics::new(llm.clone()))
        .node(RESEARCH_TOPICS, ResearchTopics::new(llm.clone(), search))
        .node(CREATE_SUMMARY, CreateSummary::new(llm))
        .edge(IDENTIFY_TOPICS, Target::node(RESEARCH_TOPICS))
        .routed(
            RESEARCH_TOPICS,
            decide_next_step,
            [
                (IDENTIFY_TOPICS, Target::node(IDENTIFY_TOPICS)),
                (RESEARCH_TOPICS, Target::node(RESEARCH_TOPICS)),
                (CREATE_SUMMARY, Target::node(CREATE_SUMMARY)),
                (ROUTE_END, Target::End),
            ],
        )
        .edge(CREATE_SUMMARY, Target::End)
        .build()
}
