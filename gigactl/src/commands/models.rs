//! Model listing command implementation

use crate::cli::ModelKindArg;
use crate::client;
use crate::config::GigactlConfig;
use crate::output;
use gigaflow_core::errors::CoreError;
use tracing::info;

/// Handle models command
pub async fn handle_models_command(kind: Option<ModelKindArg>, config: &GigactlConfig) -> Result<(), CoreError> {
    let connector = client::connect(config).await?;

    let models = match kind {
        Some(kind) => connector.list_models_of_kind(kind.into()).await?,
        None => connector.list_models().await?,
    };

    info!("Found {} models", models.len());
    output::display_models(&models, &config.default_format)
}
