//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use gigaflow_connector_gigachat::{ModelKind, Scope};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gigactl")]
#[command(about = "GigaChat workflow control tool")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API scope (PERS, B2B, CORP)
    #[arg(short, long, global = true)]
    pub scope: Option<Scope>,

    /// Default model
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run chat items through the tool-calling loop
    Chat(ChatArgs),
    /// List available models
    Models {
        /// Only models of this kind
        #[arg(short, long, value_enum)]
        kind: Option<ModelKindArg>,
    },
    /// Token accounting operations
    Tokens {
        #[command(subcommand)]
        command: TokensCommands,
    },
    /// Compute embeddings
    Embed {
        /// Texts to embed
        #[arg(required = true)]
        texts: Vec<String>,
        /// Embeddings model
        #[arg(long, default_value = "Embeddings")]
        embedding_model: String,
    },
    /// Describe an image
    Analyze {
        /// Image file
        image: PathBuf,
        /// Question about the image
        #[arg(short, long, default_value = "")]
        prompt: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// User prompt
    #[arg(required_unless_present = "items")]
    pub prompt: Option<String>,

    /// JSON file with an array of items, each with a `prompt`
    #[arg(short, long)]
    pub items: Option<PathBuf>,

    /// System message
    #[arg(long)]
    pub system: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub top_p: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub repetition_penalty: Option<f32>,

    /// Maximum tool rounds per item
    #[arg(long, default_value = "5")]
    pub max_iterations: usize,

    /// Print only the response text
    #[arg(long)]
    pub simplify: bool,

    /// Strip Markdown from the response
    #[arg(long)]
    pub remove_markdown: bool,

    /// Record failed items and keep going
    #[arg(long)]
    pub continue_on_fail: bool,

    /// Session id for server-side caching and memory
    #[arg(long)]
    pub session_id: Option<String>,
}

#[derive(Subcommand)]
pub enum TokensCommands {
    /// Count tokens of each text
    Count {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Show the remaining token balance
    Balance,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKindArg {
    Chat,
    Embedder,
}

impl From<ModelKindArg> for ModelKind {
    fn from(kind: ModelKindArg) -> Self {
        match kind {
            ModelKindArg::Chat => ModelKind::Chat,
            ModelKindArg::Embedder => ModelKind::Embedder,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}
