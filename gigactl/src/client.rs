//! Connector setup shared by all commands

use crate::config::GigactlConfig;
use gigaflow_connector_gigachat::GigaChatConnector;
use gigaflow_core::errors::CoreError;
use tracing::debug;

/// Build the connector for this process from the loaded configuration.
///
/// The token is acquired lazily by the first API call.
pub async fn connect(config: &GigactlConfig) -> Result<GigaChatConnector, CoreError> {
    if config.credentials.is_none() && config.access_token.is_none() {
        return Err(CoreError::Configuration(
            "No credentials configured. Set `credentials` in gigactl.yaml or GIGACTL_CREDENTIALS".to_string(),
        ));
    }

    debug!("Connecting to {} with scope {}", config.base_url, config.scope);
    Ok(GigaChatConnector::new(config.gigachat_config()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_requires_credentials() {
        let result = connect(&GigactlConfig::default()).await;
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connect_with_token_only() {
        let config = GigactlConfig {
            access_token: Some("tok".to_string()),
            ..Default::default()
        };
        let connector = connect(&config).await.unwrap();
        let context = connector.registry().current().await.unwrap();
        assert_eq!(context.tokens.ensure_token().await.unwrap(), "tok");
    }
}
