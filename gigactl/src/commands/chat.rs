//! Chat command implementation

use crate::cli::ChatArgs;
use crate::client;
use crate::config::GigactlConfig;
use crate::output;
use gigaflow_core::errors::CoreError;
use gigaflow_core::execution::{run_chat_batch, ChatParameters};
use gigaflow_core::types::{new_correlation_id, SamplingOptions};
use gigaflow_memory_in_memory::{InMemoryChatMemory, InMemoryConfig};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// One entry of an `--items` file
#[derive(Debug, Clone, Deserialize)]
struct ChatItem {
    prompt: String,
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

/// Handle chat command
pub async fn handle_chat_command(args: ChatArgs, config: &GigactlConfig) -> Result<(), CoreError> {
    let items = build_items(&args, config)?;
    let connector = client::connect(config).await?;

    let session_id = args.session_id.clone().unwrap_or_else(new_correlation_id);
    let memory = InMemoryChatMemory::with_config(
        session_id.clone(),
        InMemoryConfig {
            window: config.memory_window,
            structured: false,
            verbose: config.verbose,
        },
    );

    info!("Running {} chat items in session {}", items.len(), session_id);
    let results = run_chat_batch(&connector, &items, Some(&memory), &[], args.continue_on_fail).await?;

    output::display_chat_results(&results, &config.default_format)
}

/// Turn the command arguments into one parameter set per item
fn build_items(args: &ChatArgs, config: &GigactlConfig) -> Result<Vec<ChatParameters>, CoreError> {
    let items = match &args.items {
        Some(path) => read_items(path)?,
        None => vec![ChatItem {
            prompt: args.prompt.clone().unwrap_or_default(),
            system: None,
            model: None,
        }],
    };

    let sampling = SamplingOptions {
        temperature: args.temperature,
        top_p: args.top_p,
        max_tokens: args.max_tokens,
        repetition_penalty: args.repetition_penalty,
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if item.prompt.trim().is_empty() {
                return Err(CoreError::Configuration(format!("Item {} has an empty prompt", index)));
            }

            let mut params = ChatParameters::new(item.model.unwrap_or_else(|| config.model.clone()), item.prompt)
                .with_sampling(sampling.clone())
                .with_max_iterations(args.max_iterations);
            if let Some(system) = item.system.or_else(|| args.system.clone()) {
                params = params.with_system_message(system);
            }
            if let Some(session_id) = &args.session_id {
                params = params.with_session_id(session_id.clone());
            }
            params.simplify_output = args.simplify;
            params.remove_markdown = args.remove_markdown;
            Ok(params)
        })
        .collect()
}

fn read_items(path: &Path) -> Result<Vec<ChatItem>, CoreError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CoreError::Configuration(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&raw)?)
}
