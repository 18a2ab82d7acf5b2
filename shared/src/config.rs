//! Configuration management for Lambda functions.

use std::env;

use aws_config::{BehaviorVersion, Region, SdkConfig};

use crate::gateway::{FoundationModel, ModelSet};
use crate::{Error, Result};

const DEFAULT_REGION: &str = "us-east-1";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// AWS region
    pub aws_region: String,
    /// DynamoDB table holding conversation turns
    pub conversations_table: String,
    /// DynamoDB table holding indexed file contents
    pub file_context_table: String,
    /// API Gateway WebSocket management endpoint (enables streaming)
    pub websocket_endpoint: Option<String>,
    /// Chat-style model
    pub chat_model: FoundationModel,
    /// Completion-style model
    pub completion_model: FoundationModel,
    /// Embedding model
    pub embedding_model: FoundationModel,
    /// Number of prior turns handed to the model
    pub history_limit: usize,
    /// Retention hint for stored conversation turns
    pub conversation_ttl_days: i64,
    /// Upper bound on generated tokens per chat response
    pub max_response_tokens: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            aws_region: region_from_env(),
            conversations_table: required("CONVERSATIONS_TABLE")?,
            file_context_table: required("FILE_CONTEXT_TABLE")?,
            websocket_endpoint: env::var("WEBSOCKET_ENDPOINT").ok().filter(|v| !v.is_empty()),
            chat_model: model_var("CHAT_MODEL_ID", FoundationModel::ClaudeSonnet35)?,
            completion_model: model_var("COMPLETION_MODEL_ID", FoundationModel::Llama3Instruct70b)?,
            embedding_model: embedding_model_from_env()?,
            history_limit: parsed_var("HISTORY_LIMIT", 10)?,
            conversation_ttl_days: parsed_var("CONVERSATION_TTL_DAYS", 30)?,
            max_response_tokens: parsed_var("MAX_RESPONSE_TOKENS", 4096)?,
        })
    }

    pub fn model_set(&self) -> Result<ModelSet> {
        ModelSet::new(self.chat_model, self.completion_model, self.embedding_model)
    }
}

/// `AWS_REGION`, falling back to the default region.
pub fn region_from_env() -> String {
    env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string())
}

/// Embedding model for functions that need nothing else from [`Config`].
pub fn embedding_model_from_env() -> Result<FoundationModel> {
    model_var("EMBEDDING_MODEL_ID", FoundationModel::TitanEmbedTextV2)
}

/// Shared AWS configuration pinned to `region`.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("{} not set", name)))
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} is not a valid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

fn model_var(name: &str, default: FoundationModel) -> Result<FoundationModel> {
    match env::var(name) {
        Ok(id) => parse_model(name, &id, default),
        Err(_) => Ok(default),
    }
}

/// Resolve a model id, which must be of the same kind as the default.
fn parse_model(name: &str, id: &str, default: FoundationModel) -> Result<FoundationModel> {
    let model = FoundationModel::from_id(id)
        .ok_or_else(|| Error::Config(format!("{} names an unsupported model: {}", name, id)))?;
    if model.kind() != default.kind() {
        return Err(Error::Config(format!(
            "{} must name a {} model, got {}",
            name,
            default.kind(),
            id
        )));
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model() {
        let model = parse_model("CHAT_MODEL_ID", FoundationModel::ClaudeHaiku3.id(), FoundationModel::ClaudeSonnet35);
        assert_eq!(model.unwrap(), FoundationModel::ClaudeHaiku3);
    }

    #[test]
    fn test_model_var_reads_environment() {
        std::env::set_var("CODE_MENTOR_TEST_EMBEDDING_MODEL", " amazon.titan-embed-text-v2:0 ");
        let model = model_var("CODE_MENTOR_TEST_EMBEDDING_MODEL", FoundationModel::TitanEmbedTextV2);
        assert_eq!(model.unwrap(), FoundationModel::TitanEmbedTextV2);

        std::env::set_var("CODE_MENTOR_TEST_CHAT_AS_EMBEDDING", FoundationModel::ClaudeSonnet35.id());
        let model = model_var("CODE_MENTOR_TEST_CHAT_AS_EMBEDDING", FoundationModel::TitanEmbedTextV2);
        assert!(matches!(model, Err(Error::Config(_))));

        let unset = model_var("CODE_MENTOR_TEST_UNSET_MODEL", FoundationModel::Llama3Instruct8b);
        assert_eq!(unset.unwrap(), FoundationModel::Llama3Instruct8b);
    }

    #[test]
    fn test_parse_model_rejects_unknown_and_wrong_kind() {
        let unknown = parse_model("CHAT_MODEL_ID", "openai.gpt-4", FoundationModel::ClaudeSonnet35);
        assert!(matches!(unknown, Err(Error::Config(_))));

        let wrong_kind = parse_model(
            "EMBEDDING_MODEL_ID",
            FoundationModel::ClaudeSonnet35.id(),
            FoundationModel::TitanEmbedTextV2,
        );
        assert!(matches!(wrong_kind, Err(Error::Config(_))));
    }
}
