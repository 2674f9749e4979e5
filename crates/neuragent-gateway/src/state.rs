use std::sync::Arc;

use neuragent_agent::AgentFactory;
use neuragent_core::config::AppConfig;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: AppConfig,
    pub factory: Arc<AgentFactory>,
}
