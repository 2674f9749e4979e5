//! Test doubles for the collaborator traits.
//!
//! `MockCompletion` answers from a script or a closure and records every
//! request; `MockSearch` returns canned hits and counts lookups.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use neuragent_core::config::AppConfig;
use neuragent_core::error::{AgentError, Result};
use neuragent_core::traits::{CompletionService, SearchService};
use neuragent_core::types::{ChatMessage, SearchHit};

type Responder = Box<dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync>;

/// Shared record of the requests a mock received.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl CallLog {
    pub fn count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// All requests, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Content of the final message of the most recent request.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests()
            .last()
            .and_then(|req| req.last())
            .map(|m| m.content.clone())
    }

    fn push(&self, messages: Vec<ChatMessage>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages);
        }
    }
}

enum Script {
    Queue(Mutex<VecDeque<Result<String>>>),
    Responder(Responder),
}

/// Scripted completion service.
pub struct MockCompletion {
    script: Script,
    log: CallLog,
}

impl MockCompletion {
    /// Answer each request with the next queued result.
    /// Requests past the end of the queue fail with a service error.
    pub fn from_results(results: Vec<Result<String>>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(results.into())),
            log: CallLog::default(),
        }
    }

    /// Answer requests with the queued texts, in order.
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Compute each reply from the request.
    pub fn responding<F>(f: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            script: Script::Responder(Box::new(f)),
            log: CallLog::default(),
        }
    }

    /// Always reply with the same text.
    pub fn fixed(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::responding(move |_| Ok(reply.clone()))
    }

    /// Always fail with a service error.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::responding(move |_| Err(AgentError::Service(message.clone())))
    }

    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }
}

impl CompletionService for MockCompletion {
    fn complete(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<String>> {
        let reply = match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| Err(AgentError::Service("mock script exhausted".into()))),
            Script::Responder(f) => f(&messages),
        };
        self.log.push(messages);
        Box::pin(async move { reply })
    }
}

/// Canned search service.
pub struct MockSearch {
    hits: Vec<SearchHit>,
    fail_with: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            fail_with: None,
            calls: Arc::default(),
        }
    }

    /// One hit per call, echoing the query.
    pub fn echo() -> Self {
        Self::new(vec![])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::new(vec![])
        }
    }

    /// Shared handle to the queries received so far.
    pub fn queries(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

impl SearchService for MockSearch {
    fn search<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(query.to_string());
        }
        let result = match &self.fail_with {
            Some(msg) => Err(AgentError::Service(msg.clone())),
            None if self.hits.is_empty() => Ok(vec![hit(query)]),
            None => Ok(self.hits.iter().take(limit).cloned().collect()),
        };
        Box::pin(async move { result })
    }

    fn engine(&self) -> &str {
        "mock"
    }
}

/// A search hit whose fields mention `query`.
pub fn hit(query: &str) -> SearchHit {
    SearchHit {
        title: format!("About {}", query),
        url: "https://example.com/mock".to_string(),
        snippet: format!("Facts about {}.", query),
    }
}

/// Default configuration with small limits suited to tests.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.agent.max_iterations = 5;
    config.agent.max_duration_secs = 10;
    config
}
