//! Concrete implementations of the submission collaborators.

mod captcha;
mod clock;
mod notify;
mod store;
mod transport;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;

use std::sync::Arc;

pub use captcha::{HttpTokenProvider, LoadState, ScriptGate, StaticTokenProvider};
pub use clock::SystemClock;
pub use notify::TracingNotifier;
pub use store::{FileStore, MemoryStore};
pub use transport::{http_client, ReqwestTransport};

use crate::config::CaptchaConfig;
use crate::error::{LeadformError, Result};
use crate::submission::ports::TokenProvider;

/// Pick the token provider described by configuration.
///
/// A static token wins over the HTTP provider. Must be called from within a
/// tokio runtime when the HTTP provider is selected.
pub fn token_provider(
    config: &CaptchaConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn TokenProvider>> {
    if let Some(token) = &config.static_token {
        return Ok(Arc::new(StaticTokenProvider::new(token.clone())));
    }
    if config.execute_url.is_some() {
        return Ok(Arc::new(HttpTokenProvider::spawn_load(client, config)?));
    }
    Err(LeadformError::Config(
        "no token source: set captcha.static_token or captcha.execute_url".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_wins() {
        let config = CaptchaConfig {
            static_token: Some("fixed".to_string()),
            execute_url: Some("http://127.0.0.1:9/execute".to_string()),
            ..CaptchaConfig::default()
        };

        let provider = token_provider(&config, reqwest::Client::new()).unwrap();
        assert_eq!(provider.token("submit").await.as_deref(), Some("fixed"));
    }

    #[tokio::test]
    async fn test_no_token_source_is_config_error() {
        let result = token_provider(&CaptchaConfig::default(), reqwest::Client::new());
        assert!(matches!(result, Err(LeadformError::Config(_))));
    }
}
