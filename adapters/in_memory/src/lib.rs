//! In-memory implementation of ConversationMemory for testing and development
//!
//! Exchanges are kept per session id in a store shared by every handle
//! created from it. Loading returns the last `window` exchanges, like a
//! window-buffer chat memory.

use async_trait::async_trait;
use gigaflow_core::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Configuration for in-memory conversation memory
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Number of most recent exchanges returned on load
    pub window: usize,
    /// Store exchanges as protocol messages instead of flattened text
    pub structured: bool,
    /// Whether to enable verbose logging
    pub verbose: bool,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            window: 5,
            structured: false,
            verbose: false,
        }
    }
}

/// One stored exchange
#[derive(Debug, Clone)]
enum StoredExchange {
    Text { input: String, output: String },
    Structured(Vec<Message>),
}

impl StoredExchange {
    fn records(&self) -> Vec<MemoryRecord> {
        match self {
            StoredExchange::Text { input, output } => vec![
                MemoryRecord::Human(input.clone()),
                MemoryRecord::Ai(output.clone()),
            ],
            StoredExchange::Structured(messages) => vec![MemoryRecord::Messages(messages.clone())],
        }
    }
}

/// Exchanges indexed by session id
type MemoryStore = HashMap<String, Vec<StoredExchange>>;

/// Conversation memory bound to one session
#[derive(Clone)]
pub struct InMemoryChatMemory {
    store: Arc<RwLock<MemoryStore>>,
    session_id: String,
    config: InMemoryConfig,
}

impl InMemoryChatMemory {
    /// Create a memory with a fresh store
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::with_config(session_id, InMemoryConfig::default())
    }

    pub fn with_config(session_id: impl Into<String>, config: InMemoryConfig) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            session_id: session_id.into(),
            config,
        }
    }

    /// Handle on another session of the same store
    pub fn for_session(&self, session_id: impl Into<String>) -> Self {
        Self {
            store: Arc::clone(&self.store),
            session_id: session_id.into(),
            config: self.config.clone(),
        }
    }

    /// Number of exchanges stored for this session
    pub async fn exchange_count(&self) -> usize {
        self.store
            .read()
            .await
            .get(&self.session_id)
            .map_or(0, Vec::len)
    }

    /// Forget this session
    pub async fn clear(&self) {
        self.store.write().await.remove(&self.session_id);
    }

    async fn push(&self, exchange: StoredExchange) {
        let mut store = self.store.write().await;
        let exchanges = store.entry(self.session_id.clone()).or_default();
        exchanges.push(exchange);
        if self.config.verbose {
            debug!(
                "Stored exchange {} for session {}",
                exchanges.len(),
                self.session_id
            );
        }
    }
}

#[async_trait]
impl ConversationMemory for InMemoryChatMemory {
    fn session_id(&self) -> Option<String> {
        Some(self.session_id.clone())
    }

    async fn load_memory_variables(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        let store = self.store.read().await;
        let Some(exchanges) = store.get(&self.session_id) else {
            return Ok(Vec::new());
        };

        let skip = exchanges.len().saturating_sub(self.config.window);
        Ok(exchanges
            .iter()
            .skip(skip)
            .flat_map(StoredExchange::records)
            .collect())
    }

    async fn save_context(&self, input: &str, output: &str) -> Result<(), MemoryError> {
        self.push(StoredExchange::Text {
            input: input.to_string(),
            output: output.to_string(),
        })
        .await;
        Ok(())
    }

    fn supports_structured(&self) -> bool {
        self.config.structured
    }

    async fn save_messages(&self, messages: &[Message]) -> Result<(), MemoryError> {
        if !self.config.structured {
            return Err(MemoryError::Unsupported);
        }
        self.push(StoredExchange::Structured(messages.to_vec())).await;
        Ok(())
    }
}
