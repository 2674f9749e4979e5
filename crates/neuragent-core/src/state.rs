use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Message, MessageThread, Role};

/// Completion status of a node execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Completed,
    Failed,
}

/// Output recorded for the latest execution of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutput {
    pub node_name: String,
    pub output: serde_json::Value,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Entry in the state's error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub node: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Shared record threaded through a workflow graph.
///
/// Holds the conversation, the workflow cursor, the latest output of each
/// node and an append-only error log. Workflow variants embed it and expose
/// it to the runner through [`WorkflowState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    thread: MessageThread,
    #[serde(default)]
    pub current_node: Option<String>,
    #[serde(default)]
    pub next_node: Option<String>,
    node_outputs: BTreeMap<String, NodeOutput>,
    errors: Vec<ErrorRecord>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            updated_at: None,
            metadata: serde_json::Map::new(),
            thread: MessageThread::new(),
            current_node: None,
            next_node: None,
            node_outputs: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn thread(&self) -> &MessageThread {
        &self.thread
    }

    /// Append a message to the conversation.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) -> &Message {
        self.touch();
        self.thread.add(role, content)
    }

    /// Record the output of a node. A later record for the same node
    /// replaces the earlier one.
    pub fn record_output(
        &mut self,
        node_name: &str,
        output: serde_json::Value,
        status: NodeStatus,
        error: Option<String>,
    ) {
        self.node_outputs.insert(
            node_name.to_string(),
            NodeOutput {
                node_name: node_name.to_string(),
                output,
                status,
                error,
            },
        );
        self.touch();
    }

    /// Append an entry to the error log.
    pub fn record_error(
        &mut self,
        node_name: &str,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        self.errors.push(ErrorRecord {
            node: node_name.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            details: details.unwrap_or_else(|| serde_json::json!({})),
        });
        self.touch();
    }

    /// Shift `next_node` into `current_node` and set a new `next_node`.
    pub fn set_next(&mut self, node_name: &str) {
        self.current_node = self.next_node.take();
        self.next_node = Some(node_name.to_string());
        self.touch();
    }

    pub fn node_outputs(&self) -> &BTreeMap<String, NodeOutput> {
        &self.node_outputs
    }

    pub fn node_output(&self, node_name: &str) -> Option<&NodeOutput> {
        self.node_outputs.get(node_name)
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Output values keyed by node name.
    pub fn output_values(&self) -> serde_json::Map<String, serde_json::Value> {
        self.node_outputs
            .iter()
            .map(|(k, v)| (k.clone(), v.output.clone()))
            .collect()
    }

    /// JSON snapshot of messages, cursor, outputs and errors.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "messages": self.thread.messages(),
            "current_node": self.current_node,
            "next_node": self.next_node,
            "node_outputs": self.node_outputs,
            "errors": self.errors,
        })
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// A workflow-specific state that embeds an [`AgentState`].
pub trait WorkflowState: Send + 'static {
    fn agent(&self) -> &AgentState;

    fn agent_mut(&mut self) -> &mut AgentState;
}

impl WorkflowState for AgentState {
    fn agent(&self) -> &AgentState {
        self
    }

    fn agent_mut(&mut self) -> &mut AgentState {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_output_overwrites_by_name() {
        let mut state = AgentState::new();
        state.record_output("research", json!(["a"]), NodeStatus::Completed, None);
        state.record_output("summary", json!("s"), NodeStatus::Completed, None);
        state.record_output(
            "research",
            json!(["a", "b"]),
            NodeStatus::Failed,
            Some("boom".into()),
        );

        assert_eq!(state.node_outputs().len(), 2);
        let out = state.node_output("research").unwrap();
        assert_eq!(out.output, json!(["a", "b"]));
        assert_eq!(out.status, NodeStatus::Failed);
        assert_eq!(out.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_record_error_appends() {
        let mut state = AgentState::new();
        state.record_error("n1", "first", None);
        state.record_error("n2", "second", Some(json!({"code": 7})));

        let errors = state.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].node, "n1");
        assert_eq!(errors[0].details, json!({}));
        assert_eq!(errors[1].details, json!({"code": 7}));
        assert!(state.updated_at.is_some());
    }

    #[test]
    fn test_set_next_shifts_cursor() {
        let mut state = AgentState::new();
        state.set_next("identify");
        assert_eq!(state.current_node, None);
        assert_eq!(state.next_node.as_deref(), Some("identify"));

        state.set_next("research");
        assert_eq!(state.current_node.as_deref(), Some("identify"));
        assert_eq!(state.next_node.as_deref(), Some("research"));
    }

    #[test]
    fn test_output_values_and_snapshot() {
        let mut state = AgentState::new();
        state.add_message(Role::User, "hello");
        state.record_output("n", json!({"k": 1}), NodeStatus::Completed, None);

        let values = state.output_values();
        assert_eq!(values.get("n"), Some(&json!({"k": 1})));

        let snap = state.to_json();
        assert_eq!(snap["messages"][0]["content"], "hello");
        assert_eq!(snap["node_outputs"]["n"]["status"], "completed");
    }

    #[test]
    fn test_add_message_touches_state() {
        let mut state = AgentState::new();
        assert!(state.updated_at.is_none());

        let msg = state.add_message(Role::Assistant, "done");
        assert_eq!(msg.content(), "done");
        assert!(state.updated_at.is_some());
        assert_eq!(state.thread().last_content(Role::Assistant), Some("done"));
    }
}
