//! Concrete agent workflows built on the graph engine.

pub mod classify;
pub mod executor;
pub mod researcher;

use neuragent_core::error::{AgentError, Result};
use neuragent_core::types::{ChatMessage, MessageThread, Role};

/// Non-empty trimmed lines of a model reply, in order.
pub(crate) fn nonempty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// System prompt, then the conversation so far, then the instruction as a
/// user turn.
pub(crate) fn build_request(
    system_prompt: &str,
    thread: &MessageThread,
    instruction: String,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(thread.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(thread.formatted());
    messages.push(ChatMessage::user(instruction));
    messages
}

/// Content of the most recent user message.
pub(crate) fn latest_query(thread: &MessageThread) -> Result<String> {
    thread
        .last_content(Role::User)
        .map(String::from)
        .ok_or_else(|| AgentError::Validation("No user message found in state".into()))
}
