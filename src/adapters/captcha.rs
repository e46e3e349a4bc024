//! Anti-abuse token providers.
//!
//! The HTTP provider mirrors how challenge widgets behave on a page: the
//! provider script is fetched once at startup, and token requests made
//! before it finishes loading wait for it instead of failing.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::CaptchaConfig;
use crate::error::{LeadformError, Result};
use crate::submission::ports::TokenProvider;

/// Load progress of the provider script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Still fetching
    Loading,
    /// Loaded; tokens can be requested
    Ready,
    /// Loading failed; no tokens will be issued
    Failed,
}

/// Readiness gate shared by everyone waiting on the provider script.
#[derive(Debug, Clone)]
pub struct ScriptGate {
    state: watch::Receiver<LoadState>,
}

impl ScriptGate {
    /// Create a gate in the loading state, with the handle that settles it.
    pub fn pending() -> (Self, watch::Sender<LoadState>) {
        let (tx, rx) = watch::channel(LoadState::Loading);
        (Self { state: rx }, tx)
    }

    /// Create a gate that is already open.
    pub fn ready() -> Self {
        let (gate, tx) = Self::pending();
        let _ = tx.send(LoadState::Ready);
        gate
    }

    /// Get the current load state.
    pub fn state(&self) -> LoadState {
        *self.state.borrow()
    }

    /// Wait until loading settles. Returns whether the script is ready.
    pub async fn wait(&self) -> bool {
        let mut state = self.state.clone();
        let ready = match state.wait_for(|s| *s != LoadState::Loading).await {
            Ok(settled) => *settled == LoadState::Ready,
            // The loader went away without settling.
            Err(_) => false,
        };
        ready
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Token provider backed by a remote challenge service.
#[derive(Debug, Clone)]
pub struct HttpTokenProvider {
    client: reqwest::Client,
    site_key: String,
    execute_url: String,
    gate: ScriptGate,
}

impl HttpTokenProvider {
    /// Create a provider whose readiness is controlled by `gate`.
    pub fn new(
        client: reqwest::Client,
        site_key: impl Into<String>,
        execute_url: impl Into<String>,
        gate: ScriptGate,
    ) -> Self {
        Self {
            client,
            site_key: site_key.into(),
            execute_url: execute_url.into(),
            gate,
        }
    }

    /// Create a provider and start loading its script in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_load(client: reqwest::Client, config: &CaptchaConfig) -> Result<Self> {
        let execute_url = config.execute_url.clone().ok_or_else(|| {
            LeadformError::Config("captcha.execute_url is required for the HTTP provider".to_string())
        })?;

        let (gate, settle) = ScriptGate::pending();
        let script_url = format!("{}?render={}", config.script_url, config.site_key);
        let loader = client.clone();
        tokio::spawn(async move {
            let state = match loader
                .get(&script_url)
                .send()
                .await
                .and_then(|response| response.error_for_status())
            {
                Ok(_) => {
                    info!(url = %script_url, "Captcha script loaded");
                    LoadState::Ready
                }
                Err(e) => {
                    warn!(url = %script_url, error = %e, "Captcha script failed to load");
                    LoadState::Failed
                }
            };
            let _ = settle.send(state);
        });

        Ok(Self::new(client, config.site_key.clone(), execute_url, gate))
    }

    /// Get the readiness gate.
    pub fn gate(&self) -> &ScriptGate {
        &self.gate
    }

    async fn execute(&self, action: &str) -> Result<Option<String>> {
        let response = self
            .client
            .post(&self.execute_url)
            .form(&[("sitekey", self.site_key.as_str()), ("action", action)])
            .send()
            .await?
            .error_for_status()?;
        let body: TokenResponse = response.json().await?;
        Ok(body.token)
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn token(&self, action: &str) -> Option<String> {
        if !self.gate.wait().await {
            warn!(action = %action, "Captcha provider unavailable");
            return None;
        }

        match self.execute(action).await {
            Ok(token) => {
                debug!(action = %action, issued = token.is_some(), "Captcha executed");
                token
            }
            Err(e) => {
                warn!(action = %action, error = %e, "Captcha execution failed");
                None
            }
        }
    }
}

/// Token provider that always hands out the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Create a provider issuing `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _action: &str) -> Option<String> {
        Some(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mocks::serve_once;
    use std::time::Duration;

    fn provider(execute_url: String, gate: ScriptGate) -> HttpTokenProvider {
        HttpTokenProvider::new(reqwest::Client::new(), "site-key", execute_url, gate)
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("fixed");
        assert_eq!(provider.token("submit").await.as_deref(), Some("fixed"));
    }

    #[tokio::test]
    async fn test_gate_ready_and_failed() {
        assert!(ScriptGate::ready().wait().await);

        assert_eq!(ScriptGate::ready().state(), LoadState::Ready);

        let (gate, settle) = ScriptGate::pending();
        assert_eq!(gate.state(), LoadState::Loading);
        settle.send(LoadState::Failed).unwrap();
        assert!(!gate.wait().await);
        assert_eq!(gate.state(), LoadState::Failed);

        let (gate, settle) = ScriptGate::pending();
        drop(settle);
        assert!(!gate.wait().await);
    }

    #[tokio::test]
    async fn test_token_request_waits_for_script() {
        let (base, captured) = serve_once(200, r#"{"token":"t-123"}"#).await;
        let (gate, settle) = ScriptGate::pending();
        let provider = provider(format!("{}/execute", base), gate);

        let pending = tokio::spawn(async move { provider.token("signup").await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        settle.send(LoadState::Ready).unwrap();
        assert_eq!(pending.await.unwrap().as_deref(), Some("t-123"));

        let captured = captured.await.unwrap();
        assert!(captured.head.starts_with("POST /execute "));
        let body = String::from_utf8_lossy(&captured.body);
        assert!(body.contains("sitekey=site-key"));
        assert!(body.contains("action=signup"));
    }

    #[tokio::test]
    async fn test_failed_script_yields_no_token() {
        let (gate, settle) = ScriptGate::pending();
        settle.send(LoadState::Failed).unwrap();
        let provider = provider("http://127.0.0.1:9/execute".to_string(), gate);

        assert_eq!(provider.token("submit").await, None);
    }

    #[tokio::test]
    async fn test_execute_error_yields_no_token() {
        let (base, _captured) = serve_once(503, "").await;
        let provider = provider(format!("{}/execute", base), ScriptGate::ready());

        assert_eq!(provider.token("submit").await, None);
    }

    #[tokio::test]
    async fn test_spawn_load_requires_execute_url() {
        let result = HttpTokenProvider::spawn_load(reqwest::Client::new(), &CaptchaConfig::default());
        assert!(matches!(result, Err(LeadformError::Config(_))));
    }

    #[tokio::test]
    async fn test_spawn_load_opens_gate() {
        let (base, captured) = serve_once(200, "// script").await;
        let config = CaptchaConfig {
            site_key: "key".to_string(),
            script_url: format!("{}/api.js", base),
            execute_url: Some(format!("{}/execute", base)),
            ..CaptchaConfig::default()
        };

        let provider = HttpTokenProvider::spawn_load(reqwest::Client::new(), &config).unwrap();

        assert!(provider.gate().wait().await);
        let captured = captured.await.unwrap();
        assert!(captured.head.starts_with("GET /api.js?render=key "));
    }
}
