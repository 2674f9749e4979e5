use std::collections::HashMap;
use std::io::Write;

use neuragent_core::config::AppConfig;
use neuragent_core::error::AgentError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
temperature = 0.2
max_tokens = 2048
api_key = "sk-test-key"
base_url = "http://localhost:8080/v1/chat/completions"

[llm.retry]
max_retries = 5
initial_backoff_ms = 250

[agent]
max_iterations = 4
max_duration_secs = 60
debug_mode = true
log_level = "warn"

[tools]
search_engine = "tavily"
search_api_key = "tvly-test"
max_search_results = 8

[viz]
graph_layout = "neato"
show_state_details = false

[service]
host = "127.0.0.1"
port = 9000
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml_content.as_bytes()).unwrap();

    let config = AppConfig::load(file.path()).unwrap();

    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert_eq!(config.llm.temperature, 0.2);
    assert_eq!(config.llm.max_tokens, Some(2048));
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test-key"));
    let retry = config.llm.retry.as_ref().unwrap();
    assert_eq!(retry.max_retries, 5);
    assert_eq!(retry.initial_backoff_ms, 250);
    assert_eq!(retry.max_backoff_ms, 30000);

    assert_eq!(config.agent.max_iterations, 4);
    assert_eq!(config.agent.max_duration_secs, 60);
    assert!(config.agent.debug_mode);
    assert_eq!(config.log_directive(), "neuragent=debug,warn");

    assert_eq!(config.tools.search_engine, "tavily");
    assert_eq!(config.tools.max_search_results, 8);
    assert_eq!(config.viz.graph_layout, "neato");
    assert!(!config.viz.show_state_details);
    assert_eq!(config.service.bind_addr(), "127.0.0.1:9000");
}

#[test]
fn test_load_minimal_config_uses_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[llm]\nmodel = \"gpt-4\"\n").unwrap();

    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, "openai");
    assert!(config.llm.retry.is_none());
    assert_eq!(config.agent.max_iterations, 10);
    assert_eq!(config.agent.max_duration_secs, 300);
    assert_eq!(config.tools.search_engine, "duckduckgo");
    assert_eq!(config.tools.max_search_results, 5);
    assert_eq!(config.service.port, 8000);
    assert_eq!(config.log_directive(), "neuragent=info,warn");
}

#[test]
fn test_env_var_expansion_in_file() {
    std::env::set_var("NEURAGENT_IT_KEY", "sk-from-env");
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[llm]\napi_key = \"${NEURAGENT_IT_KEY}\"\n")
        .unwrap();

    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-from-env"));
}

#[test]
fn test_env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[service]\nport = 9000\n[agent]\nmax_iterations = 3\n")
        .unwrap();
    let mut config = AppConfig::load(file.path()).unwrap();

    let vars: HashMap<&str, &str> = [
        ("PORT", "7070"),
        ("AGENT_MAX_ITERATIONS", "12"),
        ("SEARCH_ENGINE", "tavily"),
        ("SHOW_STATE_DETAILS", "false"),
    ]
    .into_iter()
    .collect();
    config
        .apply_env(|k| vars.get(k).map(|v| v.to_string()))
        .unwrap();

    assert_eq!(config.service.port, 7070);
    assert_eq!(config.agent.max_iterations, 12);
    assert_eq!(config.tools.search_engine, "tavily");
    assert!(!config.viz.show_state_details);
}

#[test]
fn test_invalid_files_are_rejected() {
    let missing = AppConfig::load(std::path::Path::new("/nonexistent/neuragent.toml"));
    assert!(matches!(missing, Err(AgentError::ConfigNotFound(_))));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[agent]\nmax_iterations = \"many\"\n").unwrap();
    assert!(matches!(
        AppConfig::load(file.path()),
        Err(AgentError::Config(_))
    ));
}
