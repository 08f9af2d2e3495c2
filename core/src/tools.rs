//! Tool declarations, input shaping and result normalization

use crate::errors::ToolError;
use crate::traits::{Tool, ToolInputShape};
use crate::types::{FunctionDeclaration, FunctionParameters};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// A boxed future returned by closure-backed tools
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Handler signature of a [`FnTool`]
pub type ToolFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// Build function declarations for every supplied tool
pub fn declarations(tools: &[Arc<dyn Tool>]) -> Vec<FunctionDeclaration> {
    tools.iter().map(|tool| declaration_for(tool.as_ref())).collect()
}

/// Build the function declaration of a single tool.
///
/// A tool without usable properties gets a single required string
/// property named `input`.
pub fn declaration_for(tool: &dyn Tool) -> FunctionDeclaration {
    let (mut properties, mut required) = schema_parts(tool.parameters());

    if properties.is_empty() {
        debug!("Tool {} declares no parameters, using generic input", tool.name());
        properties.insert(
            "input".to_string(),
            json!({"type": "string", "description": "Input for the tool"}),
        );
        required = vec!["input".to_string()];
    }

    FunctionDeclaration {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: FunctionParameters {
            kind: "object".to_string(),
            properties,
            required,
        },
    }
}

fn schema_parts(schema: Option<Value>) -> (Map<String, Value>, Vec<String>) {
    let schema = match schema {
        Some(Value::String(raw)) => serde_json::from_str(&raw).unwrap_or(Value::Null),
        Some(other) => other,
        None => Value::Null,
    };

    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    (properties, required)
}

/// Shape parsed call arguments into what the tool expects.
///
/// Text tools receive the value of a sole string argument, or the compact
/// JSON of the arguments otherwise.
pub fn tool_input(shape: ToolInputShape, arguments: &Value) -> Value {
    match shape {
        ToolInputShape::Structured => arguments.clone(),
        ToolInputShape::Text => match arguments.as_object() {
            Some(map) if map.len() == 1 => match map.values().next() {
                Some(Value::String(text)) => Value::String(text.clone()),
                _ => Value::String(arguments.to_string()),
            },
            _ => Value::String(arguments.to_string()),
        },
    }
}

/// Normalize a tool result into the content of a function result message.
///
/// String results are parsed as JSON first. Empty results become a
/// `no_results` payload, double-encoded JSON strings pass through verbatim,
/// everything else is wrapped as `{status: "success", result}`.
pub fn normalize_tool_result(result: &Value, input: &Value) -> String {
    let parsed = match result {
        Value::String(raw) => {
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        other => other.clone(),
    };

    let empty = match &parsed {
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty() || text == "[]",
        _ => false,
    };
    if empty {
        return json!({
            "status": "no_results",
            "message": format!(
                "No results found in the knowledge base for query: \"{}\"",
                input_text(input)
            ),
        })
        .to_string();
    }

    if let Value::String(text) = &parsed {
        if serde_json::from_str::<Value>(text).is_ok() {
            return text.clone();
        }
    }

    json!({"status": "success", "result": parsed}).to_string()
}

/// Deserialize structured tool input into a typed argument struct
pub fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Error payload of a failed or unknown tool call
pub fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}

fn input_text(input: &Value) -> String {
    match input {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Tool backed by an async closure
pub struct FnTool {
    name: String,
    description: String,
    parameters: Option<Value>,
    shape: ToolInputShape,
    handler: ToolFn,
}

impl FnTool {
    /// Create a tool taking the structured argument object
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: None,
            shape: ToolInputShape::Structured,
            handler: Arc::new(move |input| -> BoxFuture<'static, Result<Value, ToolError>> {
                Box::pin(handler(input))
            }),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the parameter schema
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Deliver input as a single string
    pub fn text_input(mut self) -> Self {
        self.shape = ToolInputShape::Text;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Option<Value> {
        self.parameters.clone()
    }

    fn input_shape(&self) -> ToolInputShape {
        self.shape
    }

    async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
        (self.handler)(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(name: &str) -> FnTool {
        FnTool::new(name, |input| async move { Ok(input) })
    }

    #[test]
    fn test_empty_properties_get_generic_input() {
        let tool = echo("lookup").with_parameters(json!({"type": "object", "properties": {}}));
        let declaration = declaration_for(&tool);
        assert_eq!(
            Value::Object(declaration.parameters.properties.clone()),
            json!({"input": {"type": "string", "description": "Input for the tool"}})
        );
        assert_eq!(declaration.parameters.required, vec!["input".to_string()]);
        assert_eq!(declaration.parameters.kind, "object");
    }

    #[test]
    fn test_string_parameters_are_parsed() {
        let tool = echo("weather").with_parameters(json!(
            "{\"properties\": {\"city\": {\"type\": \"string\"}}, \"required\": [\"city\"]}"
        ));
        let declaration = declaration_for(&tool);
        assert!(declaration.parameters.properties.contains_key("city"));
        assert_eq!(declaration.parameters.required, vec!["city".to_string()]);
    }

    #[test]
    fn test_broken_string_parameters_fall_back() {
        let tool = echo("weather").with_parameters(json!("{oops"));
        let declaration = declaration_for(&tool);
        assert!(declaration.parameters.properties.contains_key("input"));
    }

    #[test]
    fn test_text_input_extracts_sole_string() {
        assert_eq!(
            tool_input(ToolInputShape::Text, &json!({"query": "rust"})),
            json!("rust")
        );
        assert_eq!(
            tool_input(ToolInputShape::Text, &json!({"a": 1})),
            json!("{\"a\":1}")
        );
        assert_eq!(
            tool_input(ToolInputShape::Structured, &json!({"query": "rust"})),
            json!({"query": "rust"})
        );
    }

    #[test]
    fn test_empty_array_string_is_no_results() {
        let content = normalize_tool_result(&json!("[]"), &json!("rust traits"));
        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            parsed,
            json!({
                "status": "no_results",
                "message": "No results found in the knowledge base for query: \"rust traits\""
            })
        );
        assert!(content.starts_with("{\"status\":\"no_results\""));
    }

    #[test]
    fn test_empty_string_and_empty_array_are_no_results() {
        for result in [json!(""), json!([])] {
            let parsed: Value =
                serde_json::from_str(&normalize_tool_result(&result, &json!("q"))).unwrap();
            assert_eq!(parsed["status"], "no_results");
        }
    }

    #[test]
    fn test_plain_text_is_wrapped() {
        let parsed: Value =
            serde_json::from_str(&normalize_tool_result(&json!("sunny"), &json!("q"))).unwrap();
        assert_eq!(parsed, json!({"status": "success", "result": "sunny"}));
    }

    #[test]
    fn test_double_encoded_json_passes_verbatim() {
        let inner = "{\"temp\":21}";
        let encoded = serde_json::to_string(inner).unwrap();
        assert_eq!(normalize_tool_result(&json!(encoded), &json!("q")), inner);
    }

    #[test]
    fn test_structured_result_is_wrapped() {
        let parsed: Value = serde_json::from_str(&normalize_tool_result(
            &json!({"temp": 21}),
            &json!({"city": "Moscow"}),
        ))
        .unwrap();
        assert_eq!(parsed, json!({"status": "success", "result": {"temp": 21}}));
    }

    #[test]
    fn test_parse_input() {
        #[derive(serde::Deserialize)]
        struct WeatherArgs {
            city: String,
        }

        let args: WeatherArgs = parse_input(json!({"city": "Kazan"})).unwrap();
        assert_eq!(args.city, "Kazan");

        let err = parse_input::<WeatherArgs>(json!({})).err().unwrap();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_error_payload() {
        assert_eq!(error_payload("boom"), "{\"error\":\"boom\"}");
    }
}
