//! OAuth2 client-credentials token lifecycle

use crate::config::Scope;
use crate::models::{error_message, TokenResponse};
use chrono::{DateTime, Utc};
use gigaflow_core::errors::{LlmError, LlmResult};
use gigaflow_core::types::new_correlation_id;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A cached bearer token
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    /// Server-reported expiry, informational only
    pub expires_at: Option<DateTime<Utc>>,
}

/// Acquires and caches the bearer token of one configuration.
///
/// Expiry is not tracked client-side: callers invalidate the token when the
/// API reports it as expired.
pub struct TokenManager {
    client: Client,
    auth_url: String,
    credentials: Option<String>,
    scope: Scope,
    verbose: bool,
    cached: Mutex<Option<AccessToken>>,
    acquisitions: AtomicUsize,
}

impl TokenManager {
    pub fn new(client: Client, auth_url: impl Into<String>, credentials: Option<String>, scope: Scope) -> Self {
        Self {
            client,
            auth_url: auth_url.into(),
            credentials,
            scope,
            verbose: false,
            cached: Mutex::new(None),
            acquisitions: AtomicUsize::new(0),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Return the cached token, acquiring one first if needed.
    ///
    /// The cache lock is held while acquiring, so concurrent callers share
    /// a single auth request.
    pub async fn ensure_token(&self) -> LlmResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.value.clone());
        }

        let token = self.acquire().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Replace a token the API rejected as expired.
    ///
    /// When another caller already refreshed it, the newer token is returned
    /// without a second auth request.
    pub async fn refresh(&self, stale: &str) -> LlmResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.value != stale {
                return Ok(token.value.clone());
            }
        }

        *cached = None;
        let token = self.acquire().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token
    pub async fn invalidate(&self) {
        if self.cached.lock().await.take().is_some() {
            debug!("Cached access token invalidated");
        }
    }

    /// Install an externally obtained token
    pub async fn seed(&self, value: impl Into<String>) {
        *self.cached.lock().await = Some(AccessToken {
            value: value.into(),
            expires_at: None,
        });
    }

    /// Currently cached token, if any
    pub async fn current(&self) -> Option<AccessToken> {
        self.cached.lock().await.clone()
    }

    /// Number of auth requests issued so far
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    async fn acquire(&self) -> LlmResult<AccessToken> {
        let credentials = self.credentials.as_deref().filter(|c| !c.is_empty()).ok_or_else(|| {
            LlmError::AuthenticationError("No credentials configured to obtain an access token".to_string())
        })?;

        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let rq_uid = new_correlation_id();
        let start_time = Instant::now();
        debug!("Requesting access token for scope {} (RqUID {})", self.scope, rq_uid);

        let response = self
            .client
            .post(&self.auth_url)
            .header("Authorization", format!("Basic {}", credentials))
            .header("RqUID", &rq_uid)
            .header("Accept", "application/json")
            .form(&[("scope", self.scope.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::NetworkError(format!("Auth request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::NetworkError(format!("Failed to read auth response: {}", e)))?;

        if self.verbose {
            debug!("Auth response {}: {}", status, body);
        }

        if !status.is_success() {
            warn!("Auth endpoint rejected credentials with status {}", status);
            return Err(LlmError::AuthenticationError(format!(
                "{}: {}",
                status.as_u16(),
                error_message(&body)
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::AuthenticationError(format!("Malformed auth response: {}", e)))?;
        let value = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| LlmError::AuthenticationError("Auth response carries no access_token".to_string()))?;

        info!(
            "Obtained access token for scope {} in {}ms",
            self.scope,
            start_time.elapsed().as_millis()
        );

        Ok(AccessToken {
            value,
            expires_at: parsed.expires_at.and_then(DateTime::from_timestamp_millis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(server: &MockServer, credentials: Option<&str>) -> TokenManager {
        TokenManager::new(
            Client::new(),
            format!("{}/api/v2/oauth", server.uri()),
            credentials.map(str::to_string),
            Scope::Business,
        )
    }

    #[tokio::test]
    async fn test_token_acquired_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/oauth"))
            .and(header("Authorization", "Basic c2VjcmV0"))
            .and(header_exists("RqUID"))
            .and(body_string_contains("scope=GIGACHAT_API_B2B"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "tok-1", "expires_at": 1706026848841i64})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tokens = manager(&server, Some("c2VjcmV0"));
        assert_eq!(tokens.ensure_token().await.unwrap(), "tok-1");
        assert_eq!(tokens.ensure_token().await.unwrap(), "tok-1");
        assert_eq!(tokens.acquisitions(), 1);
        assert!(tokens.current().await.unwrap().expires_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_acquisition() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/oauth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = Arc::new(manager(&server, Some("c2VjcmV0")));
        let (a, b) = tokio::join!(tokens.ensure_token(), tokens.ensure_token());
        assert_eq!(a.unwrap(), "tok-1");
        assert_eq!(b.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_auth_rejection_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"code": 6, "message": "credentials doesn't match db data"})))
            .mount(&server)
            .await;

        let err = manager(&server, Some("bad")).ensure_token().await.unwrap_err();
        match err {
            LlmError::AuthenticationError(message) => {
                assert!(message.contains("401"));
                assert!(message.contains("credentials doesn't match db data"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_access_token_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"expires_at": 1})))
            .mount(&server)
            .await;

        let err = manager(&server, Some("c2VjcmV0")).ensure_token().await.unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationError(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let tokens = manager(&server, None);
        assert!(matches!(
            tokens.ensure_token().await,
            Err(LlmError::AuthenticationError(_))
        ));
        assert_eq!(tokens.acquisitions(), 0);
    }

    #[tokio::test]
    async fn test_refresh_skips_already_replaced_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-2"})))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = manager(&server, Some("c2VjcmV0"));
        tokens.seed("tok-1").await;
        assert_eq!(tokens.refresh("tok-1").await.unwrap(), "tok-2");
        assert_eq!(tokens.refresh("tok-1").await.unwrap(), "tok-2");
        assert_eq!(tokens.acquisitions(), 1);
    }
}
