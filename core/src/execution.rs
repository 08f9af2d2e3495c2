//! Per-item chat execution and batch handling

use crate::errors::{CoreError, CoreResult, LlmResult};
use crate::markdown::strip_markdown;
use crate::memory;
use crate::orchestrator::{ToolOrchestrator, DEFAULT_MAX_ITERATIONS};
use crate::traits::{ChatBackend, ConversationMemory, Tool};
use crate::types::{FunctionCallMode, Message, SamplingOptions, Usage};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

/// Parameters of one chat item
#[derive(Debug, Clone, PartialEq)]
pub struct ChatParameters {
    pub model: String,
    pub prompt: String,
    pub system_message: Option<String>,
    pub sampling: SamplingOptions,
    pub function_call: FunctionCallMode,
    pub max_iterations: usize,
    /// Emit only the response text
    pub simplify_output: bool,
    pub remove_markdown: bool,
    /// Explicit session id, takes precedence over the memory's own
    pub session_id: Option<String>,
}

impl ChatParameters {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system_message: None,
            sampling: SamplingOptions::default(),
            function_call: FunctionCallMode::Auto,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            simplify_output: false,
            remove_markdown: false,
            session_id: None,
        }
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Output record of one chat item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutput {
    pub response: String,
    pub model: String,
    pub usage: Usage,
    pub session_id: String,
    pub iterations: usize,
}

impl ChatOutput {
    /// Render the record, or only `{response}` when simplified
    pub fn to_json(&self, simplify: bool) -> Value {
        if simplify {
            json!({ "response": self.response })
        } else {
            json!({
                "response": self.response,
                "model": self.model,
                "usage": self.usage,
                "sessionId": self.session_id,
                "iterations": self.iterations,
            })
        }
    }
}

/// Result of one batch item, paired with its input position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    pub item: usize,
    pub json: Value,
}

/// Run one chat item: rebuild history, drive the tool loop, persist the
/// exchange and shape the output.
pub async fn run_chat_item(
    backend: &dyn ChatBackend,
    params: &ChatParameters,
    memory: Option<&dyn ConversationMemory>,
    tools: &[Arc<dyn Tool>],
) -> LlmResult<ChatOutput> {
    let history = memory::build_history(memory, params.system_message.as_deref()).await;

    let session_id = params
        .session_id
        .clone()
        .or_else(|| memory.and_then(|m| m.session_id()));
    if memory.is_some() && session_id.is_none() {
        warn!("Memory is connected but no session id is available, caching is disabled");
    }

    let orchestrator = ToolOrchestrator::new(backend, &params.model)
        .with_tools(tools.to_vec())
        .with_max_iterations(params.max_iterations)
        .with_sampling(params.sampling.clone())
        .with_function_call(params.function_call.clone());

    let outcome = orchestrator
        .run(&history, Message::user(&params.prompt), session_id.as_deref())
        .await?;

    memory::persist(memory, &params.prompt, &outcome.exchange).await;

    let response = if params.remove_markdown {
        strip_markdown(&outcome.content)
    } else {
        outcome.content
    };

    Ok(ChatOutput {
        response,
        model: params.model.clone(),
        usage: outcome.usage,
        session_id: outcome.session_id.unwrap_or_default(),
        iterations: outcome.iterations,
    })
}

/// Run every item in order.
///
/// With `continue_on_fail` a failing item yields `{"error": message}` and
/// the batch goes on; otherwise the first failure aborts the batch.
pub async fn run_chat_batch(
    backend: &dyn ChatBackend,
    items: &[ChatParameters],
    memory: Option<&dyn ConversationMemory>,
    tools: &[Arc<dyn Tool>],
    continue_on_fail: bool,
) -> CoreResult<Vec<ItemResult>> {
    let mut results = Vec::with_capacity(items.len());

    for (index, params) in items.iter().enumerate() {
        match run_chat_item(backend, params, memory, tools).await {
            Ok(output) => results.push(ItemResult {
                item: index,
                json: output.to_json(params.simplify_output),
            }),
            Err(e) if continue_on_fail => {
                error!("Item {} failed: {}", index, e);
                results.push(ItemResult {
                    item: index,
                    json: json!({ "error": e.to_string() }),
                });
            }
            Err(e) => return Err(CoreError::ItemFailed { index, source: e }),
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{LlmError, MemoryError};
    use crate::traits::MemoryRecord;
    use crate::types::{ChatRequest, ChatResponse, Choice, ResponseHeaders, ResponseMessage};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Answers with the prompt echoed back, failing on prompts equal to "fail"
    #[derive(Default)]
    struct EchoBackend {
        session_ids: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn chat_completion(
            &self,
            request: &ChatRequest,
            session_id: Option<&str>,
        ) -> Result<ChatResponse, LlmError> {
            self.session_ids.lock().await.push(session_id.map(str::to_string));
            let prompt = request
                .messages
                .last()
                .and_then(Message::content)
                .unwrap_or_default()
                .to_string();
            if prompt == "fail" {
                return Err(LlmError::ApiError {
                    status: 400,
                    message: "Bad prompt".to_string(),
                });
            }
            Ok(ChatResponse {
                choices: vec![Choice {
                    index: 0,
                    message: ResponseMessage {
                        role: "assistant".to_string(),
                        content: Some(format!("**{}**", prompt)),
                        function_call: None,
                    },
                    finish_reason: Some("stop".to_string()),
                }],
                usage: Usage {
                    prompt_tokens: 5,
                    completion_tokens: 3,
                    total_tokens: 8,
                    precached_prompt_tokens: 0,
                },
                model: "GigaChat".to_string(),
                created: 0,
                headers: ResponseHeaders {
                    session_id: session_id.map(str::to_string),
                    ..Default::default()
                },
            })
        }
    }

    #[derive(Default)]
    struct SessionMemory {
        saved: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ConversationMemory for SessionMemory {
        fn session_id(&self) -> Option<String> {
            Some("memory-session".to_string())
        }

        async fn load_memory_variables(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
            Ok(Vec::new())
        }

        async fn save_context(&self, input: &str, output: &str) -> Result<(), MemoryError> {
            self.saved.lock().await.push((input.to_string(), output.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_item_output_record() {
        let backend = EchoBackend::default();
        let params = ChatParameters::new("GigaChat", "hello").with_session_id("s-1");

        let output = run_chat_item(&backend, &params, None, &[]).await.unwrap();
        assert_eq!(
            output.to_json(false),
            json!({
                "response": "**hello**",
                "model": "GigaChat",
                "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8, "precached_prompt_tokens": 0},
                "sessionId": "s-1",
                "iterations": 0
            })
        );
        assert_eq!(output.to_json(true), json!({"response": "**hello**"}));
    }

    #[tokio::test]
    async fn test_remove_markdown_applies_to_response() {
        let backend = EchoBackend::default();
        let mut params = ChatParameters::new("GigaChat", "hello");
        params.remove_markdown = true;

        let output = run_chat_item(&backend, &params, None, &[]).await.unwrap();
        assert_eq!(output.response, "hello");
        assert_eq!(output.session_id, "");
    }

    #[tokio::test]
    async fn test_memory_session_and_persistence() {
        let backend = EchoBackend::default();
        let memory = SessionMemory::default();
        let params = ChatParameters::new("GigaChat", "remember me");

        run_chat_item(&backend, &params, Some(&memory), &[]).await.unwrap();

        assert_eq!(
            *backend.session_ids.lock().await,
            vec![Some("memory-session".to_string())]
        );
        assert_eq!(
            *memory.saved.lock().await,
            vec![("remember me".to_string(), "**remember me**".to_string())]
        );
    }

    #[tokio::test]
    async fn test_batch_continue_on_fail() {
        let backend = EchoBackend::default();
        let items = vec![
            ChatParameters::new("GigaChat", "one"),
            ChatParameters::new("GigaChat", "fail"),
            ChatParameters::new("GigaChat", "three"),
        ];

        let results = run_chat_batch(&backend, &items, None, &[], true).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].item, 1);
        assert_eq!(results[1].json, json!({"error": "API error 400: Bad prompt"}));
        assert_eq!(results[2].json["response"], "**three**");
    }

    #[tokio::test]
    async fn test_batch_aborts_without_continue_on_fail() {
        let backend = EchoBackend::default();
        let items = vec![
            ChatParameters::new("GigaChat", "one"),
            ChatParameters::new("GigaChat", "fail"),
        ];

        let err = run_chat_batch(&backend, &items, None, &[], false).await.unwrap_err();
        assert!(matches!(err, CoreError::ItemFailed { index: 1, .. }));
    }
}
