//! Command-line interface for Gigaflow

use clap::Parser;
use std::process;
use tracing::{error, info, Level};

mod cli;
mod client;
mod commands;
mod config;
mod output;

use cli::*;
use config::GigactlConfig;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match GigactlConfig::load(args.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // Override config with CLI args
    let config = config.with_overrides(&args);

    info!("Starting gigactl against {} (scope {})", config.base_url, config.scope);

    let result = match args.command {
        Commands::Chat(chat_args) => commands::chat::handle_chat_command(chat_args, &config).await,
        Commands::Models { kind } => commands::models::handle_models_command(kind, &config).await,
        Commands::Tokens { command } => commands::tokens::handle_tokens_command(command, &config).await,
        Commands::Embed { texts, embedding_model } => {
            commands::embed::handle_embed_command(texts, &embedding_model, &config).await
        }
        Commands::Analyze { image, prompt } => {
            commands::analyze::handle_analyze_command(&image, &prompt, &config).await
        }
    };

    match result {
        Ok(_) => {
            info!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
