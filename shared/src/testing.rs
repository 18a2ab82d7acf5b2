//! Fakes of the injected client traits.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use crate::gateway::{FrameStream, ModelRuntime};
use crate::models::{ConversationTurn, FileContext, HistoryEntry};
use crate::store::{ContextStore, ConversationStore};
use crate::translate::{DetectedLanguage, Language, TranslationApi};
use crate::transport::TransportSink;
use crate::{Error, Result};

/// Anthropic Messages reply carrying `text`.
pub fn claude_reply(text: &str) -> Value {
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 1000, "output_tokens": 200}
    })
}

/// Streaming events for a reply split into `parts`.
pub fn claude_stream(parts: &[&str]) -> Vec<Value> {
    let mut events = vec![json!({"type": "message_start", "message": {"id": "msg_test"}})];
    events.extend(parts.iter().map(|part| {
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": part}})
    }));
    events.push(json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}));
    events.push(json!({"type": "message_stop"}));
    events
}

/// Yield enough times for detached tasks to finish on a current-thread runtime.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

enum Reply {
    Json(Value),
    Fail(String),
    Handler(fn(&Value) -> Result<Value>),
}

enum StreamReply {
    Unsupported,
    NoBody,
    Frames(Vec<Vec<u8>>),
}

pub struct FakeRuntime {
    reply: Reply,
    stream: StreamReply,
    calls: Mutex<Vec<(String, Value)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRuntime {
    fn build(reply: Reply, stream: StreamReply) -> Self {
        Self {
            reply,
            stream,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn replying(body: Value) -> Self {
        Self::build(Reply::Json(body), StreamReply::Unsupported)
    }

    pub fn failing(message: &str) -> Self {
        Self::build(Reply::Fail(message.to_string()), StreamReply::Unsupported)
    }

    pub fn with_handler(handler: fn(&Value) -> Result<Value>) -> Self {
        Self::build(Reply::Handler(handler), StreamReply::Unsupported)
    }

    pub fn streaming(events: Vec<Value>) -> Self {
        let frames = events
            .iter()
            .map(|event| serde_json::to_vec(event).unwrap())
            .collect();
        Self::streaming_raw(frames)
    }

    pub fn streaming_raw(frames: Vec<Vec<u8>>) -> Self {
        Self::build(
            Reply::Fail("streaming only".to_string()),
            StreamReply::Frames(frames),
        )
    }

    pub fn without_stream_body() -> Self {
        Self::build(Reply::Fail("streaming only".to_string()), StreamReply::NoBody)
    }

    /// Every invocation as `(model id, request body)`.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, model_id: &str, body: &[u8]) -> Value {
        let body: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        self.calls
            .lock()
            .unwrap()
            .push((model_id.to_string(), body.clone()));
        body
    }
}

#[async_trait]
impl ModelRuntime for FakeRuntime {
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let body = self.record(model_id, &body);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.reply {
            Reply::Json(value) => Ok(serde_json::to_vec(value)?),
            Reply::Fail(message) => Err(Error::Aws(message.clone())),
            Reply::Handler(handler) => Ok(serde_json::to_vec(&handler(&body)?)?),
        }
    }

    async fn invoke_stream(&self, model_id: &str, body: Vec<u8>) -> Result<Option<FrameStream>> {
        self.record(model_id, &body);
        match &self.stream {
            StreamReply::Unsupported => Err(Error::Aws("no stream configured".to_string())),
            StreamReply::NoBody => Ok(None),
            StreamReply::Frames(frames) => {
                let frames = frames.clone();
                Ok(Some(futures::stream::iter(frames.into_iter().map(Ok)).boxed()))
            }
        }
    }
}

/// Prefixes text with `[code] `; fails for listed targets or text containing `FAIL`.
pub struct FakeTranslationApi {
    failing: HashSet<Language>,
    detection: Option<Vec<DetectedLanguage>>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTranslationApi {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            detection: Some(Vec::new()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(mut self, language: Language) -> Self {
        self.failing.insert(language);
        self
    }

    pub fn detecting(mut self, candidates: Vec<DetectedLanguage>) -> Self {
        self.detection = Some(candidates);
        self
    }

    pub fn failing_detection(mut self) -> Self {
        self.detection = None;
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Most translation requests outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Largest translation request, in bytes.
    pub fn largest_request(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.len())
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TranslationApi for FakeTranslationApi {
    async fn translate_text(&self, text: &str, _source: Language, target: Language) -> Result<String> {
        self.requests.lock().unwrap().push(text.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&target) || text.contains("FAIL") {
            return Err(Error::Aws("ServiceUnavailableException".to_string()));
        }
        Ok(format!("[{}] {}", target.code(), text))
    }

    async fn detect_dominant_language(&self, _text: &str) -> Result<Vec<DetectedLanguage>> {
        self.detection
            .clone()
            .ok_or_else(|| Error::Aws("AccessDeniedException".to_string()))
    }
}

#[derive(Default)]
pub struct FakeContextStore {
    /// Newest first, like the real store.
    history: Vec<HistoryEntry>,
    file: Option<FileContext>,
    failing_history: bool,
    failing_file: bool,
    lookups: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, newest_first: Vec<HistoryEntry>) -> Self {
        self.history = newest_first;
        self
    }

    pub fn with_file(mut self, content: &str) -> Self {
        self.file = Some(FileContext {
            content: content.to_string(),
            language: Some("rust".to_string()),
        });
        self
    }

    pub fn failing_history(mut self) -> Self {
        self.failing_history = true;
        self
    }

    pub fn failing_file(mut self) -> Self {
        self.failing_file = true;
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Most lookups outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn lookup(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContextStore for FakeContextStore {
    async fn recent_turns(&self, _session_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.lookup().await;
        if self.failing_history {
            return Err(Error::Aws("ResourceNotFoundException".to_string()));
        }
        Ok(self.history.iter().take(limit).cloned().collect())
    }

    async fn file_context(&self, _repo_id: &str, _file_path: &str) -> Result<Option<FileContext>> {
        self.lookup().await;
        if self.failing_file {
            return Err(Error::Aws("ProvisionedThroughputExceededException".to_string()));
        }
        Ok(self.file.clone())
    }
}

#[derive(Default)]
pub struct FakeConversationStore {
    turns: Mutex<Vec<ConversationTurn>>,
    failing: bool,
}

impl FakeConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationStore for FakeConversationStore {
    async fn put_turn(&self, turn: &ConversationTurn) -> Result<()> {
        if self.failing {
            return Err(Error::Aws("ConditionalCheckFailedException".to_string()));
        }
        self.turns.lock().unwrap().push(turn.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTransport {
    frames: Mutex<Vec<(String, Value)>>,
    failing: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Frames delivered so far, decoded, with their connection id.
    pub fn frames(&self) -> Vec<(String, Value)> {
        self.frames.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportSink for FakeTransport {
    async fn send(&self, connection_id: &str, frame: Vec<u8>) -> Result<()> {
        if self.failing {
            return Err(Error::Aws("GoneException".to_string()));
        }
        let frame: Value = serde_json::from_slice(&frame)?;
        self.frames
            .lock()
            .unwrap()
            .push((connection_id.to_string(), frame));
        Ok(())
    }
}
