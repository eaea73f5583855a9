//! Model transport implementations for codemate.
//!
//! The provider implements the `codemate_core::Provider` trait against any
//! OpenAI-compatible `/chat/completions` endpoint (Groq in the default
//! configuration), in both streaming (SSE) and blocking modes, with a shared
//! retry/backoff policy for rate limits and transient failures.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryPolicy;

use codemate_config::AppConfig;

/// Build the configured provider.
pub fn build_from_config(config: &AppConfig) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new(
        "groq",
        &config.api_url,
        config.api_key.clone().unwrap_or_default(),
    )
    .with_retry(RetryPolicy::from_config(&config.retry))
}
