//! Embeddings command implementation

use crate::client;
use crate::config::GigactlConfig;
use crate::output;
use gigaflow_core::errors::CoreError;

/// Handle embed command
pub async fn handle_embed_command(texts: Vec<String>, model: &str, config: &GigactlConfig) -> Result<(), CoreError> {
    let connector = client::connect(config).await?;
    let embeddings = connector.embeddings(&texts, model).await?;
    output::display_embeddings(&texts, &embeddings, &config.default_format)
}
