//! Shared data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;
use validator::{Validate, ValidationErrors};

use crate::gateway::CostEstimate;
use crate::translate::Language;
use crate::{Error, Result};

/// Chat request payload.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatApiRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "repoId is required"))]
    pub repo_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "sessionId is required"))]
    pub session_id: String,
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 10000,
        message = "message is required and must be at most 10000 characters"
    ))]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub file_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub connection_id: Option<String>,
}

/// Optional string field that reads any non-string JSON value as absent.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) => Some(value),
        Some(other) => {
            debug!("Ignoring non-string optional field: {}", other);
            None
        }
        None => None,
    })
}

/// A chat request whose required fields have been checked.
#[derive(Debug, Clone)]
pub struct ValidatedChat {
    pub repo_id: String,
    pub session_id: String,
    pub message: String,
    pub language: Language,
    pub file_path: Option<String>,
    pub connection_id: Option<String>,
}

impl ChatApiRequest {
    /// Check required fields. Optional fields never fail validation: an
    /// unknown language falls back to the default and blank optional strings
    /// are treated as absent.
    pub fn into_validated(mut self) -> Result<ValidatedChat> {
        self.repo_id = self.repo_id.trim().to_string();
        self.session_id = self.session_id.trim().to_string();
        self.validate()
            .map_err(|e| Error::Validation(describe_validation(&e)))?;
        if self.message.trim().is_empty() {
            return Err(Error::Validation("message must not be blank".to_string()));
        }

        let language = match self.language.as_deref() {
            Some(code) => Language::from_code(code).unwrap_or_else(|| {
                debug!("Unsupported language '{}', using default", code);
                Language::default()
            }),
            None => Language::default(),
        };

        Ok(ValidatedChat {
            repo_id: self.repo_id,
            session_id: self.session_id,
            message: self.message,
            language,
            file_path: non_blank(self.file_path),
            connection_id: non_blank(self.connection_id),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn describe_validation(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| {
                err.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// How the answer was delivered to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    Streamed,
    Sync,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: CostEstimate,
}

/// Chat response payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message_id: String,
    pub session_id: String,
    pub repo_id: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_response: Option<String>,
    pub language: Language,
    pub findings: Vec<StructuredFinding>,
    pub code_snippets: Vec<CodeSnippet>,
    pub delivery: Delivery,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// One stored chat exchange. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub session_id: String,
    pub message_id: String,
    pub repo_id: String,
    pub user_message: String,
    pub model_response: String,
    pub language: Language,
    pub timestamp: DateTime<Utc>,
    /// Expiry as epoch seconds, interpreted by the store.
    pub ttl: i64,
}

/// Prior exchange handed back by the context store.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub user_message: String,
    pub model_response: String,
}

/// Indexed file content used for grounding.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContext {
    pub content: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Logic,
    Scalability,
    Style,
}

/// Severity-tagged issue pulled out of free model text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredFinding {
    pub severity: Severity,
    pub category: Category,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSnippet {
    pub file_path: String,
    pub original_code: String,
    pub suggested_code: String,
    pub explanation: String,
}

/// Structured review produced for a piece of code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorReview {
    pub summary: String,
    pub explanation: String,
    pub suggestion: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}

/// A [`MentorReview`] with its prose translated. `severity` and
/// `code_snippet` are always the original values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedMentorReview {
    pub summary: String,
    pub explanation: String,
    pub suggestion: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    pub language: Language,
    pub latency_ms: u64,
}
