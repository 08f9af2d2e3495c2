//! GigaChat API data models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Auth endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    /// Expiry, milliseconds since the Unix epoch
    pub expires_at: Option<i64>,
}

/// Kind of a listed model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Chat,
    Embedder,
    #[serde(other)]
    Other,
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(ModelKind::Chat),
            "embedder" => Ok(ModelKind::Embedder),
            other => Err(format!("Unknown model kind: {}", other)),
        }
    }
}

/// One entry of `GET /models`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub owned_by: String,
    #[serde(rename = "type", default)]
    pub kind: ModelKind,
}

#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    pub data: Vec<ModelInfo>,
}

/// File stored by `POST /files`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub access_policy: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenCountRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

/// Token count of one input text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    #[serde(default)]
    pub object: String,
    pub tokens: u64,
    pub characters: u64,
}

/// Remaining token budget of one usage category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub usage: String,
    pub value: f64,
}

/// `GET /balance` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(rename = "balance", default)]
    pub entries: Vec<BalanceEntry>,
}

/// Balance of the well-known usage categories, missing ones reported as zero
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalanceSummary {
    #[serde(rename = "GigaChat")]
    pub gigachat: f64,
    #[serde(rename = "GigaChat-Pro")]
    pub gigachat_pro: f64,
    #[serde(rename = "GigaChat-Max")]
    pub gigachat_max: f64,
    pub embeddings: f64,
}

impl Balance {
    /// Value of a usage category
    pub fn value_of(&self, usage: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.usage == usage)
            .map(|entry| entry.value)
    }

    pub fn summary(&self) -> BalanceSummary {
        BalanceSummary {
            gigachat: self.value_of("GigaChat").unwrap_or(0.0),
            gigachat_pro: self.value_of("GigaChat-Pro").unwrap_or(0.0),
            gigachat_max: self.value_of("GigaChat-Max").unwrap_or(0.0),
            embeddings: self.value_of("embeddings").unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmbeddingsRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

/// One embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub usage: Option<Value>,
}

/// `POST /embeddings` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsResponse {
    pub data: Vec<Embedding>,
    #[serde(default)]
    pub model: String,
}

/// Outcome of describing an uploaded image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAnalysis {
    pub file_id: String,
    pub content: String,
    pub model: String,
    pub usage: gigaflow_core::Usage,
}

/// Extract a human-readable message from an error body.
///
/// Tries a plain string body, then the `message`, `detail`, `error` and
/// `error_description` fields, and falls back to the raw body.
pub fn error_message(body: &str) -> String {
    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(parsed) => parsed,
        Err(_) => return body.trim().to_string(),
    };

    if let Value::String(text) = &parsed {
        return text.clone();
    }

    for field in ["message", "detail", "error", "error_description"] {
        match parsed.get(field) {
            Some(Value::String(text)) => return text.clone(),
            Some(Value::Null) | None => continue,
            Some(other) => return other.to_string(),
        }
    }

    parsed.to_string()
}
