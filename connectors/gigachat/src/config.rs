//! Configuration for the GigaChat connector

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_AUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
pub const DEFAULT_BASE_URL: &str = "https://gigachat.devices.sberbank.ru/api/v1";
pub const DEFAULT_MODEL: &str = "GigaChat";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// API access scope granted to the credentials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Personal use
    #[default]
    #[serde(rename = "GIGACHAT_API_PERS", alias = "PERS")]
    Personal,
    /// Business, pay-as-you-go
    #[serde(rename = "GIGACHAT_API_B2B", alias = "B2B")]
    Business,
    /// Business, prepaid
    #[serde(rename = "GIGACHAT_API_CORP", alias = "CORP")]
    Corporate,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Personal => "GIGACHAT_API_PERS",
            Scope::Business => "GIGACHAT_API_B2B",
            Scope::Corporate => "GIGACHAT_API_CORP",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GIGACHAT_API_PERS" | "PERS" => Ok(Scope::Personal),
            "GIGACHAT_API_B2B" | "B2B" => Ok(Scope::Business),
            "GIGACHAT_API_CORP" | "CORP" => Ok(Scope::Corporate),
            other => Err(format!("Unknown scope: {}", other)),
        }
    }
}

/// Fields whose change invalidates the cached token and the HTTP clients
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigIdentity {
    pub credentials: Option<String>,
    pub scope: Scope,
    pub model: String,
    pub auth_url: String,
    pub base_url: String,
}

/// GigaChat API configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GigaChatConfig {
    /// Base64 authorization key sent as `Basic` credentials to the auth endpoint
    pub credentials: Option<String>,
    pub scope: Scope,
    pub auth_url: String,
    pub base_url: String,
    /// Default model for requests that do not name one
    pub model: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Log request and response bodies
    pub verbose: bool,
    /// Verify the TLS certificate of the API hosts
    pub verify_ssl: bool,
    /// Externally obtained token, used instead of an auth round-trip
    pub access_token: Option<String>,
}

impl GigaChatConfig {
    /// Create a config with the given authorization key
    pub fn new(credentials: impl Into<String>) -> Self {
        Self {
            credentials: Some(credentials.into()),
            ..Self::default()
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API base URL, without trailing slash
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    /// Derive the auth URL from an auth host domain
    pub fn with_auth_domain(mut self, domain: &str) -> Self {
        self.auth_url = format!("{}/api/v2/oauth", domain.trim_end_matches('/'));
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Accept self-signed certificates (the vendor uses a private CA)
    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    /// Identity used for change detection
    pub fn identity(&self) -> ConfigIdentity {
        ConfigIdentity {
            credentials: self.credentials.clone(),
            scope: self.scope,
            model: self.model.clone(),
            auth_url: self.auth_url.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

impl Default for GigaChatConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            scope: Scope::default(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verbose: false,
            verify_ssl: true,
            access_token: None,
        }
    }
}

impl fmt::Debug for GigaChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GigaChatConfig")
            .field("credentials", &self.credentials.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("auth_url", &self.auth_url)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("verbose", &self.verbose)
            .field("verify_ssl", &self.verify_ssl)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GigaChatConfig::new("secret");
        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, "GigaChat");
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.scope, Scope::Personal);
        assert!(config.verify_ssl);
    }

    #[test]
    fn test_auth_domain() {
        let config = GigaChatConfig::default().with_auth_domain("https://auth.example.com/");
        assert_eq!(config.auth_url, "https://auth.example.com/api/v2/oauth");
    }

    #[test]
    fn test_identity_ignores_non_identity_fields() {
        let base = GigaChatConfig::new("secret");
        assert_eq!(base.identity(), base.clone().with_timeout(5).with_verbose(true).identity());
        assert_ne!(base.identity(), base.clone().with_model("GigaChat-Pro").identity());
        assert_ne!(base.identity(), base.clone().with_scope(Scope::Corporate).identity());
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("B2B".parse::<Scope>().unwrap(), Scope::Business);
        assert_eq!("gigachat_api_corp".parse::<Scope>().unwrap(), Scope::Corporate);
        assert!("ADMIN".parse::<Scope>().is_err());
        let scope: Scope = serde_json::from_str("\"PERS\"").unwrap();
        assert_eq!(scope, Scope::Personal);
        assert_eq!(serde_json::to_string(&Scope::Business).unwrap(), "\"GIGACHAT_API_B2B\"");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = GigaChatConfig::new("super-secret").with_access_token("tok-123");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("tok-123"));
        assert!(rendered.contains("<redacted>"));
    }
}
