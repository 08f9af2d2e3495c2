//! Core traits defining the seams between the orchestrator and its collaborators

use crate::errors::{LlmError, MemoryError, ToolError};
use crate::types::{ChatRequest, ChatResponse, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for chat completion backends
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one chat completion request, optionally bound to a server-side session
    async fn chat_completion(
        &self,
        request: &ChatRequest,
        session_id: Option<&str>,
    ) -> Result<ChatResponse, LlmError>;
}

/// How a tool wants its input delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolInputShape {
    /// The full argument object
    #[default]
    Structured,
    /// A single string
    Text,
}

/// Capability interface every externally supplied tool is adapted to
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// JSON-schema-like parameter schema, either an object or a JSON string
    fn parameters(&self) -> Option<Value> {
        None
    }

    fn input_shape(&self) -> ToolInputShape {
        ToolInputShape::Structured
    }

    /// Run the tool. The result may be a string or any structured value.
    async fn invoke(&self, input: Value) -> Result<Value, ToolError>;
}

/// One turn as stored by a conversation memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemoryRecord {
    /// A user turn
    Human(String),
    /// An assistant turn, possibly carrying a flattened tool annotation
    Ai(String),
    /// A structured exchange stored verbatim
    Messages(Vec<Message>),
}

/// Read/write contract of the external conversation memory
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// Session the memory is keyed by, forwarded to the API as `X-Session-ID`
    fn session_id(&self) -> Option<String> {
        None
    }

    /// Load prior turns, oldest first
    async fn load_memory_variables(&self) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Store one flattened exchange
    async fn save_context(&self, input: &str, output: &str) -> Result<(), MemoryError>;

    /// Whether structured exchanges can be stored with [`save_messages`](Self::save_messages)
    fn supports_structured(&self) -> bool {
        false
    }

    /// Store one exchange as protocol messages
    async fn save_messages(&self, _messages: &[Message]) -> Result<(), MemoryError> {
        Err(MemoryError::Unsupported)
    }
}
