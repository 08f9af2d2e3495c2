//! # Gigaflow Core
//!
//! Protocol types, collaborator traits and the tool-calling orchestration
//! shared by the GigaChat connector, the memory adapters and `gigactl`.
//! Nothing in this crate talks HTTP; backends plug in through
//! [`ChatBackend`](traits::ChatBackend).

pub mod errors;
pub mod execution;
pub mod markdown;
pub mod memory;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod types;

// Re-export commonly used types and traits
pub use errors::{CoreError, LlmError, MemoryError, ToolError};
pub use execution::{run_chat_batch, run_chat_item, ChatOutput, ChatParameters, ItemResult};
pub use orchestrator::{ToolOrchestrator, TurnOutcome};
pub use traits::{ChatBackend, ConversationMemory, MemoryRecord, Tool, ToolInputShape};
pub use types::{ChatRequest, ChatResponse, FunctionCall, Message, Usage};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::execution::*;
    pub use crate::tools::FnTool;
    pub use crate::traits::*;
    pub use crate::types::*;
    pub use async_trait::async_trait;
}
