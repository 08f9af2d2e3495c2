//! Core data types for the GigaChat chat protocol

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::ops::AddAssign;
use uuid::Uuid;

/// Generate a random version-4 UUID used as a correlation id.
///
/// Used for the `RqUID` header of the auth flow and the `X-Request-ID`
/// header of API calls.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// A function-call directive issued by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function the model wants to call
    pub name: String,
    /// Argument payload; the API sends an object, older payloads a JSON string
    #[serde(default)]
    pub arguments: Value,
}

impl FunctionCall {
    /// Create a new function call directive
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Arguments as a JSON object.
    ///
    /// String payloads are parsed; anything that is not an object after
    /// parsing degrades to an empty object.
    pub fn parsed_arguments(&self) -> Value {
        let parsed = match &self.arguments {
            Value::String(raw) => serde_json::from_str(raw).unwrap_or(Value::Null),
            other => other.clone(),
        };
        match parsed {
            Value::Object(_) => parsed,
            _ => Value::Object(Map::new()),
        }
    }

    /// Arguments rendered as text, as recorded in flattened memory
    pub fn arguments_text(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        }
    }
}

/// A message in the conversation, tagged by role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
        /// Ids of previously uploaded files
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<String>,
    },
    /// Either literal content or a function-call directive
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function_call: Option<FunctionCall>,
    },
    /// Result of a function call, must follow the matching assistant directive
    Function {
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    /// User message referencing uploaded files
    pub fn user_with_attachments(content: impl Into<String>, attachments: Vec<String>) -> Self {
        Message::User {
            content: content.into(),
            attachments,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            function_call: None,
        }
    }

    /// Assistant message recording a function-call directive
    pub fn function_call(call: FunctionCall) -> Self {
        Message::Assistant {
            content: None,
            function_call: Some(call),
        }
    }

    /// Function result message
    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Function {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Wire name of the role
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Function { .. } => "function",
        }
    }

    /// Literal content, if the message has any
    pub fn content(&self) -> Option<&str> {
        match self {
            Message::System { content }
            | Message::User { content, .. }
            | Message::Function { content, .. } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Function-call directive carried by an assistant message
    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Message::Assistant { function_call, .. } => function_call.as_ref(),
            _ => None,
        }
    }
}

/// Sampling parameters forwarded to the chat endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub repetition_penalty: Option<f32>,
}

/// Constraint on whether and which function the model may call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FunctionCallMode {
    #[default]
    Auto,
    None,
    /// Force a call to the named function
    Named(String),
}

impl Serialize for FunctionCallMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FunctionCallMode::Auto => serializer.serialize_str("auto"),
            FunctionCallMode::None => serializer.serialize_str("none"),
            FunctionCallMode::Named(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("name", name)?;
                map.end()
            }
        }
    }
}

impl std::str::FromStr for FunctionCallMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("Function call mode must not be empty".to_string()),
            "auto" => Ok(FunctionCallMode::Auto),
            "none" => Ok(FunctionCallMode::None),
            name => Ok(FunctionCallMode::Named(name.to_string())),
        }
    }
}

/// JSON-schema-like parameter schema of a declared function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameters {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// A function the model is allowed to call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: FunctionParameters,
}

/// Chat completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDeclaration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallMode>,
    pub stream: bool,
}

impl ChatRequest {
    /// Create a non-streaming request
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            repetition_penalty: None,
            functions: Vec::new(),
            function_call: None,
            stream: false,
        }
    }

    /// Apply sampling options, dropping values the API rejects
    pub fn with_sampling(mut self, sampling: &SamplingOptions) -> Self {
        self.temperature = sampling.temperature.filter(|t| *t >= 0.0);
        self.top_p = sampling.top_p.filter(|p| (0.0..=1.0).contains(p));
        self.max_tokens = sampling.max_tokens.filter(|m| *m > 0);
        self.repetition_penalty = sampling.repetition_penalty.filter(|r| *r > 0.0);
        self
    }

    /// Declare callable functions.
    ///
    /// The call constraint is only sent alongside a non-empty declaration
    /// list and only when it differs from `auto`.
    pub fn with_functions(mut self, functions: Vec<FunctionDeclaration>, mode: &FunctionCallMode) -> Self {
        self.function_call = match mode {
            FunctionCallMode::Auto => None,
            _ if functions.is_empty() => None,
            other => Some(other.clone()),
        };
        self.functions = functions;
        self
    }
}

/// Token accounting for one or more completions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    /// Prompt tokens served from the provider-side cache
    #[serde(default)]
    pub precached_prompt_tokens: u64,
}

impl AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.precached_prompt_tokens += other.precached_prompt_tokens;
    }
}

/// Assistant message as returned by the chat endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
}

impl ResponseMessage {
    /// Content, treating an empty string as absent
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }
}

/// Individual choice in the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Protocol metadata surfaced from response headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeaders {
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
}

/// Chat completion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created: i64,
    /// Filled from the HTTP response, never part of the body
    #[serde(skip)]
    pub headers: ResponseHeaders,
}

impl ChatResponse {
    /// Message of the first choice
    pub fn first_message(&self) -> Option<&ResponseMessage> {
        self.choices.first().map(|choice| &choice.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serializes_with_role_tag() {
        let call = Message::function_call(FunctionCall::new("search", json!({"query": "rust"})));
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({"role": "assistant", "function_call": {"name": "search", "arguments": {"query": "rust"}}})
        );

        let result = Message::function_result("search", "{\"status\":\"success\"}");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"role": "function", "name": "search", "content": "{\"status\":\"success\"}"})
        );

        let user = Message::user_with_attachments("What is this?", vec!["file-1".to_string()]);
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            json!({"role": "user", "content": "What is this?", "attachments": ["file-1"]})
        );
    }

    #[test]
    fn test_parsed_arguments_degrades_to_empty_object() {
        let from_string = FunctionCall::new("f", json!("{\"a\": 1}"));
        assert_eq!(from_string.parsed_arguments(), json!({"a": 1}));

        let broken = FunctionCall::new("f", json!("{not json"));
        assert_eq!(broken.parsed_arguments(), json!({}));

        let scalar = FunctionCall::new("f", json!(42));
        assert_eq!(scalar.parsed_arguments(), json!({}));
    }

    #[test]
    fn test_function_call_mode_serialization() {
        assert_eq!(serde_json::to_value(FunctionCallMode::None).unwrap(), json!("none"));
        assert_eq!(
            serde_json::to_value(FunctionCallMode::Named("search".into())).unwrap(),
            json!({"name": "search"})
        );
        assert_eq!("auto".parse::<FunctionCallMode>().unwrap(), FunctionCallMode::Auto);
        assert_eq!(
            "weather".parse::<FunctionCallMode>().unwrap(),
            FunctionCallMode::Named("weather".into())
        );
    }

    #[test]
    fn test_request_omits_constraint_without_functions() {
        let request = ChatRequest::new("GigaChat", vec![Message::user("hi")])
            .with_functions(Vec::new(), &FunctionCallMode::None);
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("functions").is_none());
        assert!(body.get("function_call").is_none());
        assert_eq!(body["stream"], json!(false));
    }

    #[test]
    fn test_sampling_filters_invalid_values() {
        let request = ChatRequest::new("GigaChat", Vec::new()).with_sampling(&SamplingOptions {
            temperature: Some(0.7),
            top_p: Some(1.5),
            max_tokens: Some(0),
            repetition_penalty: Some(1.1),
        });
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.top_p, None);
        assert_eq!(request.max_tokens, None);
        assert_eq!(request.repetition_penalty, Some(1.1));
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        let step = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            precached_prompt_tokens: 2,
        };
        total += &step;
        total += &step;
        assert_eq!(total.total_tokens, 30);
        assert_eq!(total.precached_prompt_tokens, 4);
    }

    #[test]
    fn test_response_parses_function_call() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "",
                    "function_call": {"name": "search", "arguments": {"query": "n8n"}},
                    "functions_state_id": "abc"
                },
                "index": 0,
                "finish_reason": "function_call"
            }],
            "created": 1700000000,
            "model": "GigaChat:1.0",
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7},
            "object": "chat.completion"
        });
        let response: ChatResponse = serde_json::from_value(body).unwrap();
        let message = response.first_message().unwrap();
        assert_eq!(message.text(), None);
        assert_eq!(message.function_call.as_ref().unwrap().name, "search");
        assert_eq!(response.usage.precached_prompt_tokens, 0);
    }
}
