use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AgentError, Result};

/// Top-level Neuragent configuration.
///
/// Built once at process start and handed to each component; nothing reads
/// it as ambient global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolConfig,
    #[serde(default)]
    pub viz: VisualizationConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Not validated at startup; requests fail later if it is missing.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            api_key: None,
            base_url: None,
            retry: None,
        }
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model() -> String { "gpt-4".to_string() }
fn default_temperature() -> f32 { 0.7 }

/// Retry configuration for completion requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum visits of any single node within one run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Whole-run deadline in seconds (0 = none).
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_memory_type")]
    pub memory_type: String,
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_duration_secs: default_max_duration(),
            debug_mode: false,
            log_level: default_log_level(),
            memory_type: default_memory_type(),
            memory_size: default_memory_size(),
        }
    }
}

fn default_max_iterations() -> usize { 10 }
fn default_max_duration() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_memory_type() -> String { "buffer".to_string() }
fn default_memory_size() -> usize { 5 }

/// Search and file tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_search_engine")]
    pub search_engine: String,
    #[serde(default)]
    pub search_api_key: Option<String>,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            search_engine: default_search_engine(),
            search_api_key: None,
            max_search_results: default_max_search_results(),
        }
    }
}

fn default_search_engine() -> String { "duckduckgo".to_string() }
fn default_max_search_results() -> usize { 5 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationConfig {
    #[serde(default = "default_graph_layout")]
    pub graph_layout: String,
    #[serde(default = "default_show_state_details")]
    pub show_state_details: bool,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            graph_layout: default_graph_layout(),
            show_state_details: default_show_state_details(),
        }
    }
}

fn default_graph_layout() -> String { "dot".to_string() }
fn default_show_state_details() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
        }
    }
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading config");
        let content = std::fs::read_to_string(path)
            .map_err(|_| AgentError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| AgentError::Config(e.to_string()))
    }

    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from environment-style variables.
    ///
    /// `lookup` returns the value of a variable if it is set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("LLM_TEMPERATURE") {
            self.llm.temperature = parse_var("LLM_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("LLM_MAX_TOKENS") {
            self.llm.max_tokens = Some(parse_var("LLM_MAX_TOKENS", &v)?);
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = lookup("AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_var("AGENT_MAX_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("DEBUG_MODE") {
            self.agent.debug_mode = parse_flag(&v);
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.agent.log_level = v;
        }
        if let Some(v) = lookup("MEMORY_TYPE") {
            self.agent.memory_type = v;
        }
        if let Some(v) = lookup("MEMORY_SIZE") {
            self.agent.memory_size = parse_var("MEMORY_SIZE", &v)?;
        }
        if let Some(v) = lookup("SEARCH_ENGINE") {
            self.tools.search_engine = v;
        }
        if let Some(v) = lookup("SEARCH_API_KEY") {
            self.tools.search_api_key = Some(v);
        }
        if let Some(v) = lookup("MAX_SEARCH_RESULTS") {
            self.tools.max_search_results = parse_var("MAX_SEARCH_RESULTS", &v)?;
        }
        if let Some(v) = lookup("GRAPH_LAYOUT") {
            self.viz.graph_layout = v;
        }
        if let Some(v) = lookup("SHOW_STATE_DETAILS") {
            self.viz.show_state_details = parse_flag(&v);
        }
        if let Some(v) = lookup("HOST") {
            self.service.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.service.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = lookup("SERVICE_DEBUG") {
            self.service.debug = parse_flag(&v);
        }
        Ok(())
    }

    /// Log filter directive derived from the agent settings.
    pub fn log_directive(&self) -> String {
        let level = if self.agent.debug_mode {
            "debug".to_string()
        } else {
            self.agent.log_level.to_lowercase()
        };
        format!("neuragent={level},warn")
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AgentError::Config(format!("invalid value for {}: '{}'", key, value)))
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_NEURAGENT_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_NEURAGENT_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_NEURAGENT_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_NEURAGENT_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_NEURAGENT_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.temperature, 0.7);
        assert!(config.llm.max_tokens.is_none());
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.log_level, "info");
        assert_eq!(config.agent.memory_type, "buffer");
        assert_eq!(config.agent.memory_size, 5);
        assert_eq!(config.tools.search_engine, "duckduckgo");
        assert_eq!(config.tools.max_search_results, 5);
        assert_eq!(config.viz.graph_layout, "dot");
        assert!(config.viz.show_state_details);
        assert_eq!(config.service.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_apply_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LLM_MODEL", "gpt-4o-mini"),
            ("LLM_TEMPERATURE", "0.2"),
            ("LLM_MAX_TOKENS", "1000"),
            ("OPENAI_API_KEY", "sk-env"),
            ("AGENT_MAX_ITERATIONS", "4"),
            ("DEBUG_MODE", "True"),
            ("MAX_SEARCH_RESULTS", "2"),
            ("PORT", "9001"),
            ("SHOW_STATE_DETAILS", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_tokens, Some(1000));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.agent.max_iterations, 4);
        assert!(config.agent.debug_mode);
        assert_eq!(config.tools.max_search_results, 2);
        assert_eq!(config.service.port, 9001);
        assert!(!config.viz.show_state_details);
        assert_eq!(config.log_directive(), "neuragent=debug,warn");
    }

    #[test]
    fn test_apply_env_rejects_bad_number() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|k| (k == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
