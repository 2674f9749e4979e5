pub mod providers;
pub mod retry;

use neuragent_core::config::LlmConfig;
use neuragent_core::traits::CompletionService;

pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create a completion client for the configured provider.
///
/// Every provider is spoken to through the OpenAI-compatible chat API; a
/// `[llm.retry]` section wraps the client in [`RetryingClient`].
pub fn create_client(config: &LlmConfig) -> Box<dyn CompletionService> {
    let client: Box<dyn CompletionService> = Box::new(OpenAiClient::new(config.clone()));
    match &config.retry {
        Some(retry) => Box::new(RetryingClient::new(client, retry.clone())),
        None => client,
    }
}
