//! Output formatting utilities for gigactl

use crate::cli::OutputFormat;
use colored::*;
use gigaflow_connector_gigachat::{Balance, EmbeddingsResponse, ImageAnalysis, ModelInfo, ModelKind, TokenCount};
use gigaflow_core::errors::CoreError;
use gigaflow_core::execution::ItemResult;
use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

/// Display chat item results
pub fn display_chat_results(results: &[ItemResult], format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Table => {
            for result in results {
                if let Some(error) = result.json.get("error").and_then(Value::as_str) {
                    println!("{} {}", format!("[{}]", result.item).bold(), error.red());
                    continue;
                }

                let response = result.json.get("response").and_then(Value::as_str).unwrap_or_default();
                if results.len() > 1 {
                    println!("{}", format!("[{}]", result.item).bold());
                }
                println!("{}", response);

                if let Some(usage) = result.json.get("usage") {
                    println!(
                        "{}",
                        format!(
                            "model {} | {} tokens | {} tool rounds | session {}",
                            text_field(&result.json, "model"),
                            usage.get("total_tokens").and_then(Value::as_u64).unwrap_or(0),
                            result.json.get("iterations").and_then(Value::as_u64).unwrap_or(0),
                            non_empty(text_field(&result.json, "sessionId"))
                        )
                        .dimmed()
                    );
                }
            }
        }
        OutputFormat::Json => print_json(&results.iter().map(|r| &r.json).collect::<Vec<_>>())?,
    }
    Ok(())
}

/// Display a list of models
pub fn display_models(models: &[ModelInfo], format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Table => {
            if models.is_empty() {
                println!("No models found");
                return Ok(());
            }

            let table_data: Vec<ModelTableRow> = models
                .iter()
                .map(|m| ModelTableRow {
                    id: m.id.clone(),
                    kind: format_kind(m.kind),
                    owned_by: non_empty(&m.owned_by).to_string(),
                })
                .collect();
            println!("{}", Table::new(table_data));
        }
        OutputFormat::Json => print_json(models)?,
    }
    Ok(())
}

/// Display token counts next to their input texts
pub fn display_token_counts(texts: &[String], counts: &[TokenCount], format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Table => {
            let table_data: Vec<TokenTableRow> = texts
                .iter()
                .zip(counts)
                .map(|(text, count)| TokenTableRow {
                    text: truncate(text, 60),
                    tokens: count.tokens,
                    characters: count.characters,
                })
                .collect();
            println!("{}", Table::new(table_data));
        }
        OutputFormat::Json => print_json(counts)?,
    }
    Ok(())
}

/// Display the token balance
pub fn display_balance(balance: &Balance, format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Table => {
            if balance.entries.is_empty() {
                println!("{}", "No balance information (only available for prepaid scopes)".yellow());
                return Ok(());
            }

            let table_data: Vec<BalanceTableRow> = balance
                .entries
                .iter()
                .map(|entry| BalanceTableRow {
                    usage: entry.usage.clone(),
                    value: entry.value,
                })
                .collect();
            println!("{}", Table::new(table_data));
        }
        OutputFormat::Json => print_json(&balance.summary())?,
    }
    Ok(())
}

/// Display embedding vectors, abbreviated in table form
pub fn display_embeddings(texts: &[String], embeddings: &EmbeddingsResponse, format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Table => {
            let table_data: Vec<EmbeddingTableRow> = embeddings
                .data
                .iter()
                .map(|e| EmbeddingTableRow {
                    text: texts.get(e.index).map(|t| truncate(t, 40)).unwrap_or_default(),
                    dimensions: e.embedding.len(),
                    head: e
                        .embedding
                        .iter()
                        .take(4)
                        .map(|v| format!("{:.4}", v))
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .collect();
            println!("{}", Table::new(table_data));
        }
        OutputFormat::Json => print_json(embeddings)?,
    }
    Ok(())
}

/// Display the answer about an image
pub fn display_analysis(analysis: &ImageAnalysis, format: &OutputFormat) -> Result<(), CoreError> {
    match format {
        OutputFormat::Table => {
            println!("{}", analysis.content);
            println!(
                "{}",
                format!(
                    "file {} | model {} | {} tokens",
                    analysis.file_id, analysis.model, analysis.usage.total_tokens
                )
                .dimmed()
            );
        }
        OutputFormat::Json => print_json(analysis)?,
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CoreError::Internal(format!("Failed to serialize to JSON: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn format_kind(kind: ModelKind) -> String {
    match kind {
        ModelKind::Chat => "chat".green().to_string(),
        ModelKind::Embedder => "embedder".blue().to_string(),
        ModelKind::Other => "other".dimmed().to_string(),
    }
}

fn text_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or_default()
}

fn non_empty(text: &str) -> &str {
    if text.is_empty() {
        "-"
    } else {
        text
    }
}

/// Shorten text to at most `max` characters
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head)
}

/// Table row for model display
#[derive(Tabled)]
struct ModelTableRow {
    #[tabled(rename = "Model")]
    id: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Owner")]
    owned_by: String,
}

#[derive(Tabled)]
struct TokenTableRow {
    #[tabled(rename = "Text")]
    text: String,
    #[tabled(rename = "Tokens")]
    tokens: u64,
    #[tabled(rename = "Characters")]
    characters: u64,
}

#[derive(Tabled)]
struct BalanceTableRow {
    #[tabled(rename = "Usage")]
    usage: String,
    #[tabled(rename = "Tokens left")]
    value: f64,
}

#[derive(Tabled)]
struct EmbeddingTableRow {
    #[tabled(rename = "Text")]
    text: String,
    #[tabled(rename = "Dimensions")]
    dimensions: usize,
    #[tabled(rename = "Head")]
    head: String,
}
