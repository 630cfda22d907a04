//! OpenAI client configuration with sensible defaults.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Create an OpenAI client with configured timeout.
///
/// A bounded timeout prevents hung provider calls from pinning a request
/// task forever; callers surface the timeout as a provider error.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// Whether an OpenAI API key is configured in the environment.
pub fn api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").map_or(false, |key| !key.trim().is_empty())
}
