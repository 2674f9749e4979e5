use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use neuragent_agent::AgentFactory;
use neuragent_core::config::AppConfig;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(config: AppConfig, factory: Arc<AgentFactory>) -> Self {
        Self {
            state: Arc::new(AppState { config, factory }),
        }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let bind = self.state.config.service.bind_addr();
        let app = router(self.state.clone());

        let listener = TcpListener::bind(&bind).await?;
        info!(bind = %bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

/// All routes, with permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/query", post(routes::query))
        .route("/research", post(routes::research))
        .route("/visualize/{agent_type}", get(routes::visualize))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
