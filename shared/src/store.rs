//! Conversation history and file-context storage.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;

use crate::models::{ConversationTurn, FileContext, HistoryEntry};
use crate::{Error, Result};

/// Read side used to ground a chat request.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Up to `limit` most recent turns of a session, newest first.
    async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<HistoryEntry>>;

    async fn file_context(&self, repo_id: &str, file_path: &str) -> Result<Option<FileContext>>;
}

/// Write side for finished turns.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn put_turn(&self, turn: &ConversationTurn) -> Result<()>;
}

/// DynamoDB tables:
/// - conversations: partition `sessionId`, sort `messageId`
/// - file context: partition `repoId`, sort `filePath`
#[derive(Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    conversations_table: String,
    file_context_table: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, conversations_table: String, file_context_table: String) -> Self {
        Self {
            client,
            conversations_table,
            file_context_table,
        }
    }
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|value| value.as_s().ok())
        .cloned()
}

#[async_trait]
impl ContextStore for DynamoStore {
    async fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .query()
            .table_name(&self.conversations_table)
            .key_condition_expression("sessionId = :sid")
            .expression_attribute_values(":sid", AttributeValue::S(session_id.to_string()))
            .scan_index_forward(false)
            .limit(i32::try_from(limit).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to query conversation history: {}", e)))?;

        Ok(response
            .items()
            .iter()
            .filter_map(|item| {
                Some(HistoryEntry {
                    user_message: string_attr(item, "userMessage")?,
                    model_response: string_attr(item, "modelResponse")?,
                })
            })
            .collect())
    }

    async fn file_context(&self, repo_id: &str, file_path: &str) -> Result<Option<FileContext>> {
        let response = self
            .client
            .get_item()
            .table_name(&self.file_context_table)
            .key("repoId", AttributeValue::S(repo_id.to_string()))
            .key("filePath", AttributeValue::S(file_path.to_string()))
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to load file context: {}", e)))?;

        Ok(response.item().and_then(|item| {
            Some(FileContext {
                content: string_attr(item, "content")?,
                language: string_attr(item, "language"),
            })
        }))
    }
}

#[async_trait]
impl ConversationStore for DynamoStore {
    async fn put_turn(&self, turn: &ConversationTurn) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.conversations_table)
            .item("sessionId", AttributeValue::S(turn.session_id.clone()))
            .item("messageId", AttributeValue::S(turn.message_id.clone()))
            .item("repoId", AttributeValue::S(turn.repo_id.clone()))
            .item("userMessage", AttributeValue::S(turn.user_message.clone()))
            .item("modelResponse", AttributeValue::S(turn.model_response.clone()))
            .item("language", AttributeValue::S(turn.language.code().to_string()))
            .item("timestamp", AttributeValue::S(turn.timestamp.to_rfc3339()))
            .item("ttl", AttributeValue::N(turn.ttl.to_string()))
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to store conversation turn: {}", e)))?;

        Ok(())
    }
}
