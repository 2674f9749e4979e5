use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, info};

use neuragent_core::config::ToolConfig;
use neuragent_core::error::{AgentError, Result};
use neuragent_core::traits::SearchService;
use neuragent_core::types::SearchHit;

/// Offline search engine returning synthetic results.
///
/// Never contacts the network; results name the configured engine so that
/// downstream prompts remain recognisable in logs.
pub struct SimulatedSearch {
    engine: String,
    max_results: usize,
}

impl SimulatedSearch {
    pub fn new(engine: impl Into<String>, max_results: usize) -> Self {
        Self {
            engine: engine.into(),
            max_results,
        }
    }
}

impl SearchService for SimulatedSearch {
    fn search<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        Box::pin(async move {
            let n = limit.min(self.max_results);
            debug!(query, n, "Simulated search");
            Ok((1..=n)
                .map(|i| SearchHit {
                    title: format!("Search Result {} for '{}'", i, query),
                    url: format!("https://example.com/result{}", i),
                    snippet: format!(
                        "This is a simulated search result {} for the query '{}'. \
                         In a real deployment, this would return actual search results from {}.",
                        i, query, self.engine
                    ),
                })
                .collect())
        })
    }

    fn engine(&self) -> &str {
        &self.engine
    }
}

/// Tavily search API client.
pub struct TavilySearch {
    api_key: String,
    max_results: usize,
    http: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: &str, max_results: usize) -> Self {
        Self {
            api_key: api_key.to_string(),
            max_results,
            http: reqwest::Client::new(),
        }
    }
}

impl SearchService for TavilySearch {
    fn search<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        Box::pin(async move {
            let max = limit.min(self.max_results);

            let resp = self
                .http
                .post("https://api.tavily.com/search")
                .json(&json!({
                    "api_key": self.api_key,
                    "query": query,
                    "max_results": max,
                }))
                .send()
                .await
                .map_err(|e| AgentError::Service(format!("web_search: {}", e)))?;

            if !resp.status().is_success() {
                return Err(AgentError::Service(format!(
                    "web_search: HTTP {}",
                    resp.status()
                )));
            }

            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| AgentError::Service(format!("web_search: {}", e)))?;

            Ok(parse_tavily(&body))
        })
    }

    fn engine(&self) -> &str {
        "tavily"
    }
}

fn parse_tavily(body: &serde_json::Value) -> Vec<SearchHit> {
    body["results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|r| SearchHit {
                    title: r["title"].as_str().unwrap_or("").to_string(),
                    url: r["url"].as_str().unwrap_or("").to_string(),
                    snippet: r["content"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Pick a search service for the configured engine.
///
/// `tavily` with an API key talks to the Tavily API; anything else is
/// served by [`SimulatedSearch`].
pub fn create_search(config: &ToolConfig) -> Box<dyn SearchService> {
    match (config.search_engine.as_str(), config.search_api_key.as_deref()) {
        ("tavily", Some(key)) if !key.is_empty() => {
            info!("Using Tavily web search");
            Box::new(TavilySearch::new(key, config.max_search_results))
        }
        (engine, _) => Box::new(SimulatedSearch::new(engine, config.max_search_results)),
    }
}

/// Render hits as prompt text.
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".into();
    }
    hits.iter()
        .map(|h| format!("**{}**\n{}\nURL: {}", h.title, h.snippet, h.url))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
