//! Per-model-family JSON envelopes. Nothing in here leaves the gateway.

use serde::{Deserialize, Serialize};

use super::{
    ChatMessage, ChatRequest, CompletionRequest, EmbeddingDimensions, EmbeddingRequest,
    FoundationModel, ModelResponse,
};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

#[derive(Serialize)]
struct MessagesBody<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: MessagesUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Serialize)]
struct LlamaBody {
    prompt: String,
    max_gen_len: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct LlamaResponse {
    generation: String,
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    generation_token_count: u32,
    stop_reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanEmbedBody<'a> {
    input_text: &'a str,
    dimensions: u32,
    normalize: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanEmbedResponse {
    embedding: Vec<f32>,
    #[serde(default)]
    input_text_token_count: u32,
}

/// Streaming event from the Messages API. Only deltas and the stop events
/// matter; every other event type lands in `Other`.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum StreamEvent {
    ContentBlockDelta { delta: ContentDelta },
    MessageDelta { delta: MessageDelta },
    MessageStop {},
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
pub(crate) struct ContentDelta {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct MessageDelta {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

pub(crate) struct DecodedText {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub stop_reason: Option<String>,
}

impl DecodedText {
    pub fn into_response(self, model: FoundationModel, latency_ms: u64) -> ModelResponse {
        ModelResponse {
            text: self.text,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            stop_reason: self.stop_reason,
            model_id: model.id().to_string(),
            latency_ms,
        }
    }
}

pub(crate) struct DecodedEmbedding {
    pub embedding: Vec<f32>,
    pub input_tokens: u32,
}

pub(crate) fn chat_body(request: &ChatRequest) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&MessagesBody {
        anthropic_version: ANTHROPIC_VERSION,
        max_tokens: request.max_tokens,
        system: Some(request.system_prompt.as_str()).filter(|s| !s.is_empty()),
        messages: &request.messages,
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: Some(request.stop_sequences.as_slice()).filter(|s| !s.is_empty()),
    })
}

pub(crate) fn decode_chat(raw: &[u8]) -> serde_json::Result<DecodedText> {
    let response: MessagesResponse = serde_json::from_slice(raw)?;
    let text = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<String>();

    Ok(DecodedText {
        text,
        input_tokens: response.usage.input_tokens,
        output_tokens: response.usage.output_tokens,
        stop_reason: response.stop_reason,
    })
}

/// Llama 3 instruct template with explicit header and end-of-turn tokens.
fn llama_prompt(system_prompt: &str, user_prompt: &str) -> String {
    let mut prompt = String::from("<|begin_of_text|>");
    if !system_prompt.is_empty() {
        prompt.push_str("<|start_header_id|>system<|end_header_id|>\n\n");
        prompt.push_str(system_prompt);
        prompt.push_str("<|eot_id|>");
    }
    prompt.push_str("<|start_header_id|>user<|end_header_id|>\n\n");
    prompt.push_str(user_prompt);
    prompt.push_str("<|eot_id|>");
    prompt.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
    prompt
}

pub(crate) fn completion_body(request: &CompletionRequest) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&LlamaBody {
        prompt: llama_prompt(&request.system_prompt, &request.user_prompt),
        max_gen_len: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
    })
}

pub(crate) fn decode_completion(raw: &[u8]) -> serde_json::Result<DecodedText> {
    let response: LlamaResponse = serde_json::from_slice(raw)?;
    Ok(DecodedText {
        text: response.generation,
        input_tokens: response.prompt_token_count,
        output_tokens: response.generation_token_count,
        stop_reason: response.stop_reason,
    })
}

pub(crate) fn embedding_body(request: &EmbeddingRequest) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&TitanEmbedBody {
        input_text: &request.text,
        dimensions: request.dimensions.as_u32(),
        normalize: request.normalize,
    })
}

pub(crate) fn decode_embedding(
    raw: &[u8],
    dimensions: EmbeddingDimensions,
) -> std::result::Result<DecodedEmbedding, String> {
    let response: TitanEmbedResponse = serde_json::from_slice(raw).map_err(|e| e.to_string())?;
    if response.embedding.len() != dimensions.as_u32() as usize {
        return Err(format!(
            "expected {} dimensions, got {}",
            dimensions.as_u32(),
            response.embedding.len()
        ));
    }
    Ok(DecodedEmbedding {
        embedding: response.embedding,
        input_tokens: response.input_text_token_count,
    })
}
