//! Active configuration and the HTTP clients bound to it

use crate::auth::TokenManager;
use crate::config::GigaChatConfig;
use gigaflow_core::errors::{LlmError, LlmResult};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One configuration together with its clients and token cache.
///
/// A context is immutable once built; a configuration change produces a new
/// context instead of mutating this one.
pub struct ClientContext {
    pub config: GigaChatConfig,
    pub api: Client,
    pub tokens: TokenManager,
}

impl ClientContext {
    pub fn new(config: GigaChatConfig) -> LlmResult<Self> {
        let api = build_client(&config)?;
        let auth = build_client(&config)?;
        let tokens = TokenManager::new(auth, config.auth_url.clone(), config.credentials.clone(), config.scope)
            .with_verbose(config.verbose);

        Ok(Self { config, api, tokens })
    }
}

fn build_client(config: &GigaChatConfig) -> LlmResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .danger_accept_invalid_certs(!config.verify_ssl)
        .build()
        .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Holds the active [`ClientContext`] and swaps it on identity changes
#[derive(Default)]
pub struct ConfigRegistry {
    active: RwLock<Option<Arc<ClientContext>>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a configuration, returning whether its identity changed.
    ///
    /// A changed identity gets a fresh context with an empty token cache,
    /// seeded from `config.access_token` when present. With `eager_token`
    /// and no supplied token the new context acquires one immediately.
    /// Callers still holding the previous context keep using it.
    pub async fn update(&self, config: GigaChatConfig, eager_token: bool) -> LlmResult<bool> {
        let context = {
            let mut active = self.active.write().await;

            if let Some(current) = active.as_ref() {
                if current.config.identity() == config.identity() {
                    if let Some(token) = config.access_token {
                        debug!("Configuration unchanged, adopting supplied access token");
                        current.tokens.seed(token).await;
                    }
                    return Ok(false);
                }
            }

            let context = Arc::new(ClientContext::new(config)?);
            if let Some(token) = context.config.access_token.clone() {
                context.tokens.seed(token).await;
            }
            *active = Some(context.clone());
            context
        };

        info!(
            "Configuration changed: model {}, scope {}, base URL {}",
            context.config.model, context.config.scope, context.config.base_url
        );

        if eager_token && context.config.access_token.is_none() {
            context.tokens.ensure_token().await?;
        }

        Ok(true)
    }

    /// The active context
    pub async fn current(&self) -> LlmResult<Arc<ClientContext>> {
        self.active
            .read()
            .await
            .clone()
            .ok_or_else(|| LlmError::ConfigError("No GigaChat configuration has been applied".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> GigaChatConfig {
        GigaChatConfig::new("c2VjcmV0")
            .with_auth_url(format!("{}/api/v2/oauth", server.uri()))
            .with_base_url(format!("{}/api/v1", server.uri()))
    }

    async fn mount_auth(server: &MockServer, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v2/oauth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_current_before_update_is_config_error() {
        let registry = ConfigRegistry::new();
        assert!(matches!(registry.current().await, Err(LlmError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_unchanged_identity_is_noop() {
        let server = MockServer::start().await;
        mount_auth(&server, 1).await;

        let registry = ConfigRegistry::new();
        assert!(registry.update(config(&server), true).await.unwrap());
        let first = registry.current().await.unwrap();

        assert!(!registry.update(config(&server).with_timeout(30), true).await.unwrap());
        let second = registry.current().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_identity_change_builds_fresh_context() {
        let server = MockServer::start().await;
        mount_auth(&server, 2).await;

        let registry = ConfigRegistry::new();
        registry.update(config(&server), true).await.unwrap();
        let old = registry.current().await.unwrap();

        assert!(registry.update(config(&server).with_model("GigaChat-Max"), true).await.unwrap());
        let new = registry.current().await.unwrap();

        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(new.config.model, "GigaChat-Max");
        assert_eq!(new.tokens.acquisitions(), 1);
        // the previous context stays usable for in-flight callers
        assert_eq!(old.tokens.current().await.unwrap().value, "tok");
    }

    #[tokio::test]
    async fn test_supplied_token_skips_auth() {
        let server = MockServer::start().await;
        mount_auth(&server, 0).await;

        let registry = ConfigRegistry::new();
        registry
            .update(config(&server).with_access_token("external"), true)
            .await
            .unwrap();
        let context = registry.current().await.unwrap();
        assert_eq!(context.tokens.ensure_token().await.unwrap(), "external");
        assert_eq!(context.tokens.acquisitions(), 0);
    }

    #[tokio::test]
    async fn test_lazy_update_defers_acquisition() {
        let server = MockServer::start().await;
        mount_auth(&server, 0).await;

        let registry = ConfigRegistry::new();
        registry.update(config(&server), false).await.unwrap();
        assert!(registry.current().await.unwrap().tokens.current().await.is_none());
    }
}
