//! GigaChat connector for Gigaflow
//!
//! Authenticated access to the GigaChat REST API: chat completions, model
//! listing, file upload, token counting, balance and embeddings. Every call
//! obtains its bearer token through the [`TokenManager`] of the active
//! [`ClientContext`] and is retried once when the API reports the token as
//! expired.

use async_trait::async_trait;
use gigaflow_core::errors::{LlmError, LlmResult};
use gigaflow_core::traits::ChatBackend;
use gigaflow_core::types::{new_correlation_id, ChatRequest, ChatResponse, Message, ResponseHeaders};
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

mod auth;
mod config;
mod models;
mod registry;

pub use auth::{AccessToken, TokenManager};
pub use config::{
    ConfigIdentity, GigaChatConfig, Scope, DEFAULT_AUTH_URL, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
};
pub use models::{
    error_message, Balance, BalanceEntry, BalanceSummary, Embedding, EmbeddingsResponse, ImageAnalysis,
    ModelInfo, ModelKind, TokenCount, UploadedFile,
};
pub use registry::{ClientContext, ConfigRegistry};

use models::{EmbeddingsRequest, ModelsResponse, TokenCountRequest};

/// Prompt used when image analysis is requested without one
pub const DEFAULT_IMAGE_PROMPT: &str = "Что изображено на фото?";

/// GigaChat implementation of [`ChatBackend`] plus the auxiliary endpoints
pub struct GigaChatConnector {
    registry: Arc<ConfigRegistry>,
}

impl GigaChatConnector {
    /// Create a connector with its own registry holding `config`
    pub async fn new(config: GigaChatConfig) -> LlmResult<Self> {
        let registry = Arc::new(ConfigRegistry::new());
        registry.update(config, false).await?;
        Ok(Self { registry })
    }

    /// Create a connector on a shared registry
    pub fn with_registry(registry: Arc<ConfigRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    /// Apply a new configuration, see [`ConfigRegistry::update`]
    pub async fn update_config(&self, config: GigaChatConfig, eager_token: bool) -> LlmResult<bool> {
        self.registry.update(config, eager_token).await
    }

    /// Send a chat completion request, optionally bound to a session
    pub async fn chat_completion(&self, request: &ChatRequest, session_id: Option<&str>) -> LlmResult<ChatResponse> {
        let context = self.registry.current().await?;
        let url = format!("{}/chat/completions", context.config.base_url);
        let start_time = Instant::now();

        let mut request = request.clone();
        if request.model.is_empty() {
            request.model = context.config.model.clone();
        }
        if context.config.verbose {
            debug!(
                "Chat request: {}",
                serde_json::to_string(&request).unwrap_or_default()
            );
        }

        let response = send_authorized(&context, "chat completion", |client, token| {
            let mut builder = client.post(&url).bearer_auth(token).json(&request);
            if let Some(session_id) = session_id {
                builder = builder.header("X-Session-ID", session_id);
            }
            Ok(builder)
        })
        .await?;

        let headers = response_headers(response.headers());
        let mut chat_response: ChatResponse = read_json(response, context.config.verbose).await?;
        chat_response.headers = headers;

        info!(
            "Chat completion with {} finished in {}ms, {} total tokens",
            request.model,
            start_time.elapsed().as_millis(),
            chat_response.usage.total_tokens
        );
        Ok(chat_response)
    }

    /// List the models available to the credentials
    pub async fn list_models(&self) -> LlmResult<Vec<ModelInfo>> {
        let context = self.registry.current().await?;
        let url = format!("{}/models", context.config.base_url);

        let response = send_authorized(&context, "model listing", |client, token| {
            Ok(client.get(&url).bearer_auth(token))
        })
        .await?;
        let models: ModelsResponse = read_json(response, context.config.verbose).await?;

        debug!("Listed {} models", models.data.len());
        Ok(models.data)
    }

    /// List only the models of one kind
    pub async fn list_models_of_kind(&self, kind: ModelKind) -> LlmResult<Vec<ModelInfo>> {
        Ok(self
            .list_models()
            .await?
            .into_iter()
            .filter(|model| model.kind == kind)
            .collect())
    }

    /// Upload a file for later use as a message attachment
    pub async fn upload_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
        purpose: &str,
    ) -> LlmResult<UploadedFile> {
        let context = self.registry.current().await?;
        let url = format!("{}/files", context.config.base_url);
        let size = bytes.len();

        let response = send_authorized(&context, "file upload", |client, token| {
            let part = Part::bytes(bytes.clone())
                .file_name(file_name.to_string())
                .mime_str(mime_type)
                .map_err(|e| LlmError::ConfigError(format!("Invalid MIME type {}: {}", mime_type, e)))?;
            let form = Form::new().part("file", part).text("purpose", purpose.to_string());
            Ok(client.post(&url).bearer_auth(token).multipart(form))
        })
        .await?;
        let uploaded: UploadedFile = read_json(response, context.config.verbose).await?;

        info!("Uploaded {} ({} bytes) as {}", file_name, size, uploaded.id);
        Ok(uploaded)
    }

    /// Count tokens of each text for a model
    pub async fn count_tokens(&self, texts: &[String], model: Option<&str>) -> LlmResult<Vec<TokenCount>> {
        let context = self.registry.current().await?;
        let url = format!("{}/tokens/count", context.config.base_url);
        let body = TokenCountRequest {
            model: model.unwrap_or(&context.config.model),
            input: texts,
        };

        let response = send_authorized(&context, "token count", |client, token| {
            Ok(client.post(&url).bearer_auth(token).json(&body))
        })
        .await?;
        read_json(response, context.config.verbose).await
    }

    /// Remaining token balance; only available for prepaid scopes
    pub async fn get_balance(&self) -> LlmResult<Balance> {
        let context = self.registry.current().await?;
        let url = format!("{}/balance", context.config.base_url);

        let response = send_authorized(&context, "balance", |client, token| {
            Ok(client.get(&url).bearer_auth(token))
        })
        .await?;
        read_json(response, context.config.verbose).await
    }

    /// Compute embeddings for each text
    pub async fn embeddings(&self, texts: &[String], model: &str) -> LlmResult<EmbeddingsResponse> {
        let context = self.registry.current().await?;
        let url = format!("{}/embeddings", context.config.base_url);
        let body = EmbeddingsRequest { model, input: texts };

        let response = send_authorized(&context, "embeddings", |client, token| {
            Ok(client.post(&url).bearer_auth(token).json(&body))
        })
        .await?;
        let embeddings: EmbeddingsResponse = read_json(response, context.config.verbose).await?;

        debug!("Computed {} embeddings with {}", embeddings.data.len(), model);
        Ok(embeddings)
    }

    /// Upload an image and ask the model about it
    pub async fn analyze_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: &str,
        prompt: &str,
        model: Option<&str>,
    ) -> LlmResult<ImageAnalysis> {
        let uploaded = self.upload_file(bytes, file_name, mime_type, "general").await?;

        let prompt = if prompt.trim().is_empty() { DEFAULT_IMAGE_PROMPT } else { prompt };
        let model = match model {
            Some(model) => model.to_string(),
            None => self.registry.current().await?.config.model.clone(),
        };
        let request = ChatRequest::new(
            model,
            vec![Message::user_with_attachments(prompt, vec![uploaded.id.clone()])],
        );

        let response = self.chat_completion(&request, None).await?;
        let content = response
            .first_message()
            .and_then(|message| message.content.clone())
            .ok_or_else(|| LlmError::ResponseParseError("No content in image analysis response".to_string()))?;

        Ok(ImageAnalysis {
            file_id: uploaded.id,
            content,
            model: response.model,
            usage: response.usage,
        })
    }
}

#[async_trait]
impl ChatBackend for GigaChatConnector {
    async fn chat_completion(&self, request: &ChatRequest, session_id: Option<&str>) -> Result<ChatResponse, LlmError> {
        GigaChatConnector::chat_completion(self, request, session_id).await
    }
}

/// Send a bearer-authenticated request built by `build`.
///
/// A 401 whose body mentions an expired token refreshes the token and
/// resends once with the same `X-Request-ID`; any other non-2xx answer, or
/// a failing retry, becomes [`LlmError::ApiError`].
async fn send_authorized<F>(context: &ClientContext, operation: &str, build: F) -> LlmResult<Response>
where
    F: Fn(&Client, &str) -> LlmResult<RequestBuilder>,
{
    let request_id = new_correlation_id();
    let token = context.tokens.ensure_token().await?;
    debug!("Sending {} request {}", operation, request_id);

    let response = send(build(&context.api, &token)?.header("X-Request-ID", &request_id)).await?;
    if response.status() != StatusCode::UNAUTHORIZED {
        return check_status(response).await;
    }

    let body = response.text().await.unwrap_or_default();
    if !is_token_expired(&body) {
        return Err(LlmError::ApiError {
            status: StatusCode::UNAUTHORIZED.as_u16(),
            message: error_message(&body),
        });
    }

    warn!("Access token expired during {}, refreshing and retrying once", operation);
    let token = context.tokens.refresh(&token).await?;
    let retry = send(build(&context.api, &token)?.header("X-Request-ID", &request_id)).await?;
    check_status(retry).await
}

async fn send(builder: RequestBuilder) -> LlmResult<Response> {
    builder.send().await.map_err(|e| {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::NetworkError(format!("HTTP request failed: {}", e))
        }
    })
}

async fn check_status(response: Response) -> LlmResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    warn!("GigaChat API answered {}: {}", status, body);
    Err(LlmError::ApiError {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn is_token_expired(body: &str) -> bool {
    body.to_lowercase().contains("expired")
}

async fn read_json<T: DeserializeOwned>(response: Response, verbose: bool) -> LlmResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| LlmError::NetworkError(format!("Failed to read response: {}", e)))?;
    if verbose {
        debug!("Response body: {}", body);
    }
    serde_json::from_str(&body).map_err(|e| LlmError::ResponseParseError(format!("Failed to parse response: {}", e)))
}

fn response_headers(headers: &HeaderMap) -> ResponseHeaders {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    ResponseHeaders {
        request_id: get("x-request-id"),
        session_id: get("x-session-id"),
        client_id: get("x-client-id"),
    }
}
