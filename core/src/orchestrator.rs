//! Bounded tool-calling loop around a chat backend

use crate::errors::{LlmError, LlmResult, ToolError};
use crate::tools;
use crate::traits::{ChatBackend, Tool};
use crate::types::{
    ChatRequest, FunctionCall, FunctionCallMode, FunctionDeclaration, Message, SamplingOptions, Usage,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default bound on tool rounds per user turn
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Result of one orchestrated user turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// Content of the last model response, possibly empty
    pub content: String,
    /// Usage summed over every chat call of the turn
    pub usage: Usage,
    /// Completed tool rounds
    pub iterations: usize,
    /// `X-Session-ID` echoed by the last response
    pub session_id: Option<String>,
    /// Messages produced after the user message
    pub exchange: Vec<Message>,
    /// True when the loop ended because the iteration bound was reached
    pub hit_iteration_limit: bool,
}

/// Drives the model through function calls until it answers in plain text
/// or the iteration bound is reached.
pub struct ToolOrchestrator<'a> {
    backend: &'a dyn ChatBackend,
    model: String,
    tools: Vec<Arc<dyn Tool>>,
    max_iterations: usize,
    sampling: SamplingOptions,
    function_call: FunctionCallMode,
}

impl<'a> ToolOrchestrator<'a> {
    pub fn new(backend: &'a dyn ChatBackend, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            tools: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            sampling: SamplingOptions::default(),
            function_call: FunctionCallMode::Auto,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the iteration bound; at least one chat call is always made
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_function_call(mut self, mode: FunctionCallMode) -> Self {
        self.function_call = mode;
        self
    }

    /// Run one user turn on top of `history`.
    ///
    /// Each round sends the full message list with every tool declared. A
    /// function-call directive runs the named tool and appends its result;
    /// plain content ends the turn.
    pub async fn run(
        &self,
        history: &[Message],
        user_message: Message,
        session_id: Option<&str>,
    ) -> LlmResult<TurnOutcome> {
        let declarations: Vec<FunctionDeclaration> = tools::declarations(&self.tools);
        let mut outcome = TurnOutcome::default();

        loop {
            let mut messages = Vec::with_capacity(history.len() + outcome.exchange.len() + 1);
            messages.extend_from_slice(history);
            messages.push(user_message.clone());
            messages.extend(outcome.exchange.iter().cloned());

            let request = ChatRequest::new(&self.model, messages)
                .with_sampling(&self.sampling)
                .with_functions(declarations.clone(), &self.function_call);

            debug!(
                "Chat round {} with {} messages and {} functions",
                outcome.iterations + 1,
                request.messages.len(),
                request.functions.len()
            );
            let response = self.backend.chat_completion(&request, session_id).await?;

            outcome.usage += &response.usage;
            if response.headers.session_id.is_some() {
                outcome.session_id = response.headers.session_id.clone();
            }

            let message = response
                .first_message()
                .cloned()
                .ok_or_else(|| LlmError::ResponseParseError("Response contains no choices".to_string()))?;

            outcome.content = message.content.clone().unwrap_or_default();
            if let Some(text) = message.text() {
                outcome.exchange.push(Message::assistant(text));
            }

            let Some(call) = message.function_call else {
                break;
            };

            outcome.exchange.push(Message::function_call(call.clone()));
            let result = self.invoke_tool(&call).await;
            outcome.exchange.push(result);
            outcome.iterations += 1;

            if outcome.iterations >= self.max_iterations {
                warn!(
                    "Stopping after {} tool rounds without a final answer",
                    outcome.iterations
                );
                outcome.hit_iteration_limit = true;
                break;
            }
        }

        info!(
            "Chat turn finished after {} tool rounds, {} total tokens",
            outcome.iterations, outcome.usage.total_tokens
        );
        Ok(outcome)
    }

    /// Run the tool named by `call` and produce the function result message.
    ///
    /// Unknown tools and tool failures become an `{"error": ...}` payload so
    /// the model can react to them.
    pub async fn invoke_tool(&self, call: &FunctionCall) -> Message {
        let Some(tool) = self.tools.iter().find(|tool| tool.name() == call.name) else {
            warn!("Model requested unknown tool {}", call.name);
            let error = ToolError::NotFound(call.name.clone());
            return Message::function_result(&call.name, tools::error_payload(&error.to_string()));
        };

        let arguments = call.parsed_arguments();
        let input = tools::tool_input(tool.input_shape(), &arguments);
        debug!("Invoking tool {} with {}", call.name, input);

        match tool.invoke(input.clone()).await {
            Ok(result) => {
                Message::function_result(&call.name, tools::normalize_tool_result(&result, &input))
            }
            Err(e) => {
                warn!("Tool {} failed: {}", call.name, e);
                Message::function_result(&call.name, tools::error_payload(&e.to_string()))
            }
        }
    }
}
