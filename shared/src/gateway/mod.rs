//! Model invocation gateway.
//!
//! Three model kinds speak three incompatible wire protocols on Bedrock: a
//! structured message list (chat), a single templated prompt string with role
//! delimiter tokens (completion) and a text-to-vector call (embedding). The
//! gateway owns all of that JSON shaping and hands callers one request and one
//! response shape per kind. There is no retry here; a failed call surfaces once
//! as [`Error::Invocation`].

mod bedrock;
mod envelope;
mod pricing;
mod stream;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

pub use bedrock::BedrockRuntime;
pub use pricing::{estimate_cost, CostEstimate};

/// Stream of raw upstream event payloads, one JSON document per item.
pub type FrameStream = BoxStream<'static, Result<Vec<u8>>>;

/// Lazily decoded chat stream; finite and not restartable.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// Transport underneath the gateway. Implementations move bytes only.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Invoke `model_id` with a JSON body and return the full response body.
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>>;

    /// Invoke `model_id` with response streaming. `None` means the upstream
    /// produced no body at all.
    async fn invoke_stream(&self, model_id: &str, body: Vec<u8>) -> Result<Option<FrameStream>>;
}

/// The three invocation shapes supported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Completion,
    Embedding,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Chat => write!(f, "chat"),
            ModelKind::Completion => write!(f, "completion"),
            ModelKind::Embedding => write!(f, "embedding"),
        }
    }
}

/// Foundation models the gateway knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoundationModel {
    ClaudeSonnet35,
    ClaudeHaiku3,
    Llama3Instruct70b,
    Llama3Instruct8b,
    TitanEmbedTextV2,
}

impl FoundationModel {
    pub const ALL: [FoundationModel; 5] = [
        FoundationModel::ClaudeSonnet35,
        FoundationModel::ClaudeHaiku3,
        FoundationModel::Llama3Instruct70b,
        FoundationModel::Llama3Instruct8b,
        FoundationModel::TitanEmbedTextV2,
    ];

    /// Bedrock model identifier.
    pub fn id(&self) -> &'static str {
        match self {
            FoundationModel::ClaudeSonnet35 => "anthropic.claude-3-5-sonnet-20240620-v1:0",
            FoundationModel::ClaudeHaiku3 => "anthropic.claude-3-haiku-20240307-v1:0",
            FoundationModel::Llama3Instruct70b => "meta.llama3-70b-instruct-v1:0",
            FoundationModel::Llama3Instruct8b => "meta.llama3-8b-instruct-v1:0",
            FoundationModel::TitanEmbedTextV2 => "amazon.titan-embed-text-v2:0",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|model| model.id() == id.trim())
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            FoundationModel::ClaudeSonnet35 | FoundationModel::ClaudeHaiku3 => ModelKind::Chat,
            FoundationModel::Llama3Instruct70b | FoundationModel::Llama3Instruct8b => {
                ModelKind::Completion
            }
            FoundationModel::TitanEmbedTextV2 => ModelKind::Embedding,
        }
    }
}

/// Models used for each kind. Every slot holds a model of its own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSet {
    chat: FoundationModel,
    completion: FoundationModel,
    embedding: FoundationModel,
}

impl ModelSet {
    pub fn new(
        chat: FoundationModel,
        completion: FoundationModel,
        embedding: FoundationModel,
    ) -> Result<Self> {
        for (model, expected) in [
            (chat, ModelKind::Chat),
            (completion, ModelKind::Completion),
            (embedding, ModelKind::Embedding),
        ] {
            if model.kind() != expected {
                return Err(Error::Config(format!(
                    "{} is a {} model, not a {} model",
                    model.id(),
                    model.kind(),
                    expected
                )));
            }
        }
        Ok(Self {
            chat,
            completion,
            embedding,
        })
    }

    /// Same set with the embedding slot replaced.
    pub fn with_embedding(self, embedding: FoundationModel) -> Result<Self> {
        Self::new(self.chat, self.completion, embedding)
    }

    pub fn chat(&self) -> FoundationModel {
        self.chat
    }

    pub fn completion(&self) -> FoundationModel {
        self.completion
    }

    pub fn embedding(&self) -> FoundationModel {
        self.embedding
    }
}

impl Default for ModelSet {
    fn default() -> Self {
        Self {
            chat: FoundationModel::ClaudeSonnet35,
            completion: FoundationModel::Llama3Instruct70b,
            embedding: FoundationModel::TitanEmbedTextV2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of an ordered chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
}

impl ChatRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            max_tokens: 4096,
            temperature: 0.3,
            top_p: 0.9,
            stop_sequences: Vec::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(Error::Validation("chat request needs at least one message".to_string()));
        }
        check_sampling(self.max_tokens, self.temperature, self.top_p)
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: 2048,
            temperature: 0.5,
            top_p: 0.9,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_sampling(self.max_tokens, self.temperature, self.top_p)
    }
}

/// Output sizes supported by the embedding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum EmbeddingDimensions {
    D256,
    D512,
    #[default]
    D1024,
}

impl EmbeddingDimensions {
    pub fn as_u32(self) -> u32 {
        match self {
            EmbeddingDimensions::D256 => 256,
            EmbeddingDimensions::D512 => 512,
            EmbeddingDimensions::D1024 => 1024,
        }
    }
}

impl TryFrom<u32> for EmbeddingDimensions {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            256 => Ok(EmbeddingDimensions::D256),
            512 => Ok(EmbeddingDimensions::D512),
            1024 => Ok(EmbeddingDimensions::D1024),
            other => Err(format!("unsupported embedding dimensions: {}", other)),
        }
    }
}

impl From<EmbeddingDimensions> for u32 {
    fn from(value: EmbeddingDimensions) -> Self {
        value.as_u32()
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub text: String,
    pub dimensions: EmbeddingDimensions,
    pub normalize: bool,
}

impl EmbeddingRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dimensions: EmbeddingDimensions::default(),
            normalize: true,
        }
    }
}

/// Request for any model kind.
#[derive(Debug, Clone)]
pub enum ModelRequest {
    Chat(ChatRequest),
    Completion(CompletionRequest),
    Embedding(EmbeddingRequest),
}

impl ModelRequest {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelRequest::Chat(_) => ModelKind::Chat,
            ModelRequest::Completion(_) => ModelKind::Completion,
            ModelRequest::Embedding(_) => ModelKind::Embedding,
        }
    }
}

/// Decoded text-generation result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub stop_reason: Option<String>,
    pub model_id: String,
    /// Wall-clock time of the upstream call including decode.
    pub latency_ms: u64,
}

/// Decoded embedding result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
    pub input_tokens: u32,
    pub model_id: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone)]
pub enum ModelOutput {
    Text(ModelResponse),
    Embedding(EmbeddingResponse),
}

/// One piece of a streamed chat response.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub text: String,
    pub is_complete: bool,
    pub stop_reason: Option<String>,
}

impl StreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_complete: false,
            stop_reason: None,
        }
    }

    pub fn terminal(stop_reason: Option<String>) -> Self {
        Self {
            text: String::new(),
            is_complete: true,
            stop_reason,
        }
    }
}

fn check_sampling(max_tokens: u32, temperature: f32, top_p: f32) -> Result<()> {
    if max_tokens == 0 {
        return Err(Error::Validation("maxTokens must be greater than 0".to_string()));
    }
    if !(0.0..=1.0).contains(&temperature) {
        return Err(Error::Validation(format!("temperature {} is outside [0, 1]", temperature)));
    }
    if !(0.0..=1.0).contains(&top_p) {
        return Err(Error::Validation(format!("topP {} is outside [0, 1]", top_p)));
    }
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Uniform entry point for chat, completion and embedding models.
pub struct ModelGateway {
    runtime: Arc<dyn ModelRuntime>,
    models: ModelSet,
}

impl ModelGateway {
    pub fn new(runtime: Arc<dyn ModelRuntime>, models: ModelSet) -> Self {
        Self { runtime, models }
    }

    pub fn models(&self) -> ModelSet {
        self.models
    }

    /// Dispatch any request kind to its dedicated entry point.
    pub async fn invoke(&self, request: &ModelRequest) -> Result<ModelOutput> {
        match request {
            ModelRequest::Chat(chat) => self.invoke_chat(chat).await.map(ModelOutput::Text),
            ModelRequest::Completion(completion) => {
                self.invoke_completion(completion).await.map(ModelOutput::Text)
            }
            ModelRequest::Embedding(embedding) => {
                self.invoke_embedding(embedding).await.map(ModelOutput::Embedding)
            }
        }
    }

    pub async fn invoke_chat(&self, request: &ChatRequest) -> Result<ModelResponse> {
        request.validate()?;
        let model = self.models.chat;
        let body = envelope::chat_body(request).map_err(|e| Error::invocation(ModelKind::Chat, e))?;

        let started = Instant::now();
        let raw = self
            .runtime
            .invoke(model.id(), body)
            .await
            .map_err(|e| Error::invocation(ModelKind::Chat, e))?;
        let decoded = envelope::decode_chat(&raw).map_err(|e| Error::invocation(ModelKind::Chat, e))?;
        let latency_ms = elapsed_ms(started);

        debug!(
            "Chat invocation on {} finished in {}ms ({} in / {} out tokens)",
            model.id(),
            latency_ms,
            decoded.input_tokens,
            decoded.output_tokens
        );

        Ok(decoded.into_response(model, latency_ms))
    }

    pub async fn invoke_completion(&self, request: &CompletionRequest) -> Result<ModelResponse> {
        request.validate()?;
        let model = self.models.completion;
        let body = envelope::completion_body(request)
            .map_err(|e| Error::invocation(ModelKind::Completion, e))?;

        let started = Instant::now();
        let raw = self
            .runtime
            .invoke(model.id(), body)
            .await
            .map_err(|e| Error::invocation(ModelKind::Completion, e))?;
        let decoded = envelope::decode_completion(&raw)
            .map_err(|e| Error::invocation(ModelKind::Completion, e))?;
        let latency_ms = elapsed_ms(started);

        Ok(decoded.into_response(model, latency_ms))
    }

    /// Stream a chat response.
    ///
    /// The returned stream is pull-based: nothing beyond the initial request is
    /// read from upstream until the caller polls. Dropping the stream abandons
    /// the upstream connection.
    pub async fn invoke_chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        request.validate()?;
        let model = self.models.chat;
        let body = envelope::chat_body(request).map_err(|e| Error::invocation(ModelKind::Chat, e))?;

        let frames = self
            .runtime
            .invoke_stream(model.id(), body)
            .await
            .map_err(|e| Error::invocation(ModelKind::Chat, e))?
            .ok_or_else(|| Error::invocation(ModelKind::Chat, "upstream returned no response body"))?;

        Ok(Box::pin(stream::decode_chunks(frames)))
    }

    pub async fn invoke_embedding(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = self.models.embedding;
        let body = envelope::embedding_body(request)
            .map_err(|e| Error::invocation(ModelKind::Embedding, e))?;

        let started = Instant::now();
        let raw = self
            .runtime
            .invoke(model.id(), body)
            .await
            .map_err(|e| Error::invocation(ModelKind::Embedding, e))?;
        let decoded = envelope::decode_embedding(&raw, request.dimensions)
            .map_err(|e| Error::invocation(ModelKind::Embedding, e))?;
        let latency_ms = elapsed_ms(started);

        Ok(EmbeddingResponse {
            embedding: decoded.embedding,
            input_tokens: decoded.input_tokens,
            model_id: model.id().to_string(),
            latency_ms,
        })
    }
}
