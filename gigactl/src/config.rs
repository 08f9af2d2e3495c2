//! Configuration management for gigactl

use crate::cli::{Cli, OutputFormat};
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use gigaflow_connector_gigachat::{
    GigaChatConfig, Scope, DEFAULT_AUTH_URL, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
};
use gigaflow_core::errors::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the gigactl CLI
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GigactlConfig {
    /// Base64 authorization key
    pub credentials: Option<String>,
    pub scope: Scope,
    pub auth_url: String,
    pub base_url: String,
    pub model: String,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Log request and response bodies
    pub verbose: bool,
    pub verify_ssl: bool,
    /// Pre-obtained access token
    pub access_token: Option<String>,
    pub default_format: OutputFormat,
    /// Exchanges of chat history replayed per item
    pub memory_window: usize,
}

impl Default for GigactlConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            scope: Scope::default(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            verbose: false,
            verify_ssl: true,
            access_token: None,
            default_format: OutputFormat::Table,
            memory_window: 5,
        }
    }
}

impl GigactlConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self, CoreError> {
        let mut figment = Figment::new();

        let default_config_paths = ["gigactl.yaml", "gigactl.yml", ".gigactl.yaml", ".gigactl.yml"];
        if let Some(path) = default_config_paths.iter().find(|path| Path::new(path).exists()) {
            figment = figment.merge(Yaml::file(path));
        }

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(CoreError::Configuration(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }

        // GIGACTL_CREDENTIALS, GIGACTL_SCOPE, ...
        figment = figment.merge(Env::prefixed("GIGACTL_"));

        figment
            .extract()
            .map_err(|e| CoreError::Configuration(format!("Failed to parse configuration: {}", e)))
    }

    /// Apply CLI argument overrides to the configuration
    pub fn with_overrides(mut self, args: &Cli) -> Self {
        if let Some(scope) = args.scope {
            self.scope = scope;
        }
        if let Some(ref model) = args.model {
            self.model = model.clone();
        }
        if let Some(format) = args.format {
            self.default_format = format;
        }
        if args.insecure {
            self.verify_ssl = false;
        }
        if args.verbose >= 2 {
            self.verbose = true;
        }
        self
    }

    /// Connector configuration derived from this config
    pub fn gigachat_config(&self) -> GigaChatConfig {
        let mut config = GigaChatConfig::default()
            .with_scope(self.scope)
            .with_auth_url(self.auth_url.clone())
            .with_base_url(self.base_url.clone())
            .with_model(self.model.clone())
            .with_timeout(self.timeout)
            .with_verbose(self.verbose)
            .with_verify_ssl(self.verify_ssl);
        config.credentials = self.credentials.clone();
        config.access_token = self.access_token.clone();
        config
    }
}
