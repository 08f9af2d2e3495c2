//! Token accounting command implementation

use crate::cli::TokensCommands;
use crate::client;
use crate::config::GigactlConfig;
use crate::output;
use gigaflow_core::errors::CoreError;
use tracing::info;

/// Handle tokens commands
pub async fn handle_tokens_command(command: TokensCommands, config: &GigactlConfig) -> Result<(), CoreError> {
    let connector = client::connect(config).await?;

    match command {
        TokensCommands::Count { texts } => {
            let counts = connector.count_tokens(&texts, Some(&config.model)).await?;
            info!(
                "Counted {} tokens over {} texts",
                counts.iter().map(|c| c.tokens).sum::<u64>(),
                counts.len()
            );
            output::display_token_counts(&texts, &counts, &config.default_format)
        }
        TokensCommands::Balance => {
            let balance = connector.get_balance().await?;
            output::display_balance(&balance, &config.default_format)
        }
    }
}
