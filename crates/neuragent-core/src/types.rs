use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AgentError;

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(AgentError::Validation(format!(
                "Role must be one of [user, assistant, system, tool], got '{}'",
                other
            ))),
        }
    }
}

/// A single conversational turn. Fields are read-only once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: String,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            metadata: serde_json::Map::new(),
            name: None,
            tool_call_id: None,
        }
    }

    pub fn tool(
        content: impl Into<String>,
        name: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    /// Attach metadata before the message is appended to a thread.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    pub fn formatted(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
            name: self.name.clone(),
            tool_call_id: self.tool_call_id.clone(),
        }
    }
}

/// Role-tagged message as sent to a completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
        }
    }
}

/// Ordered, append-only conversation log.
///
/// A thread is owned by exactly one workflow run and has no removal
/// operation: message order is the conversation history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageThread {
    messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl MessageThread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new message and return it.
    pub fn add(&mut self, role: Role, content: impl Into<String>) -> &Message {
        self.push(Message::new(role, content))
    }

    /// Append a message with a textual role, rejecting unknown roles.
    pub fn add_role(&mut self, role: &str, content: impl Into<String>) -> crate::Result<&Message> {
        let role: Role = role.parse()?;
        Ok(self.add(role, content))
    }

    pub fn add_user(&mut self, content: impl Into<String>) -> &Message {
        self.add(Role::User, content)
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) -> &Message {
        self.add(Role::Assistant, content)
    }

    pub fn add_system(&mut self, content: impl Into<String>) -> &Message {
        self.add(Role::System, content)
    }

    pub fn add_tool(
        &mut self,
        content: impl Into<String>,
        name: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> &Message {
        self.push(Message::tool(content, name, tool_call_id))
    }

    /// Append a pre-built message (e.g. one carrying metadata).
    pub fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        self.updated_at = Some(Utc::now());
        let last = self.messages.len() - 1;
        &self.messages[last]
    }

    /// Messages in the shape a completion request expects, in append order.
    pub fn formatted(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(Message::formatted).collect()
    }

    /// Content of the most recent message with the given role.
    pub fn last_content(&self, role: Role) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == role)
            .map(|m| m.content.as_str())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

/// A single search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Textual result of a file-store operation.
///
/// Failures are reported as text with `is_error` set, never as `Err`, so
/// that workflow nodes stay total.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("tool".parse::<Role>().unwrap(), Role::Tool);
        let err = "function".parse::<Role>().unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn test_thread_preserves_append_order() {
        let mut thread = MessageThread::new();
        thread.add_user("first");
        thread.add_system("second");
        thread.add_assistant("third");
        thread.add_tool("fourth", "file_read", "call-1");

        let formatted = thread.formatted();
        assert_eq!(formatted.len(), 4);
        let contents: Vec<&str> = formatted.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third", "fourth"]);
        assert_eq!(formatted[1].role, Role::System);
        assert_eq!(formatted[3].name.as_deref(), Some("file_read"));
        assert_eq!(formatted[3].tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn test_add_returns_new_message() {
        let mut thread = MessageThread::new();
        let msg = thread.add(Role::User, "hello");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), "hello");
        assert!(!msg.id().is_empty());
        assert!(thread.updated_at().is_some());
    }

    #[test]
    fn test_add_role_rejects_unknown() {
        let mut thread = MessageThread::new();
        assert!(thread.add_role("assistant", "ok").is_ok());
        assert!(thread.add_role("robot", "nope").is_err());
        assert_eq!(thread.len(), 1);
    }

    #[test]
    fn test_last_content() {
        let mut thread = MessageThread::new();
        assert_eq!(thread.last_content(Role::User), None);
        thread.add_user("q1");
        thread.add_assistant("a1");
        thread.add_user("q2");
        assert_eq!(thread.last_content(Role::User), Some("q2"));
        assert_eq!(thread.last_content(Role::Assistant), Some("a1"));
    }

    #[test]
    fn test_message_metadata() {
        let mut thread = MessageThread::new();
        let msg = Message::new(Role::User, "hi").with_metadata("source", serde_json::json!("http"));
        thread.push(msg);
        assert_eq!(
            thread.messages()[0].metadata().get("source"),
            Some(&serde_json::json!("http"))
        );
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("x")).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
        assert!(!json.contains("name"));
    }
}
