//! Chat request pipeline.
//!
//! validate -> fetch context -> build prompt -> dispatch (stream or sync)
//! -> require non-empty -> translate -> extract findings -> persist -> respond

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::findings::{extract_code_snippets, extract_findings};
use crate::gateway::{estimate_cost, ChatMessage, ChatRequest, ModelGateway};
use crate::models::{
    ChatApiRequest, ChatResponse, ConversationTurn, Delivery, FileContext, HistoryEntry, Usage,
    ValidatedChat,
};
use crate::prompt::build_system_prompt;
use crate::store::{ContextStore, ConversationStore};
use crate::translate::Translator;
use crate::transport::{StreamFrame, TransportSink};
use crate::{Error, Result};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    pub history_limit: usize,
    pub conversation_ttl_days: i64,
    pub max_response_tokens: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            history_limit: 10,
            conversation_ttl_days: 30,
            max_response_tokens: 4096,
        }
    }
}

impl From<&Config> for ChatSettings {
    fn from(config: &Config) -> Self {
        Self {
            history_limit: config.history_limit,
            conversation_ttl_days: config.conversation_ttl_days,
            max_response_tokens: config.max_response_tokens,
        }
    }
}

pub struct ChatOrchestrator {
    gateway: Arc<ModelGateway>,
    translator: Arc<Translator>,
    context: Arc<dyn ContextStore>,
    conversations: Arc<dyn ConversationStore>,
    transport: Option<Arc<dyn TransportSink>>,
    settings: ChatSettings,
}

impl ChatOrchestrator {
    pub fn new(
        gateway: Arc<ModelGateway>,
        translator: Arc<Translator>,
        context: Arc<dyn ContextStore>,
        conversations: Arc<dyn ConversationStore>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            gateway,
            translator,
            context,
            conversations,
            transport: None,
            settings,
        }
    }

    /// Enables streamed delivery for requests carrying a connection id.
    pub fn with_transport(mut self, transport: Arc<dyn TransportSink>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub async fn handle(&self, request: ChatApiRequest) -> Result<ChatResponse> {
        let started = Instant::now();
        let chat = request.into_validated()?;

        let (history, file) = self.fetch_context(&chat).await;
        let request = ChatRequest::new(
            build_system_prompt(chat.file_path.as_deref(), file.as_ref()),
            transcript(history, &chat.message),
        )
        .with_max_tokens(self.settings.max_response_tokens);

        let (text, delivery, usage) = match (chat.connection_id.as_deref(), &self.transport) {
            (Some(connection_id), Some(transport)) => {
                let text = self
                    .relay_stream(&request, connection_id, transport.as_ref())
                    .await?;
                (text, Delivery::Streamed, None)
            }
            _ => {
                let response = self.gateway.invoke_chat(&request).await?;
                let usage = Usage {
                    input_tokens: response.input_tokens,
                    output_tokens: response.output_tokens,
                    cost: estimate_cost(
                        self.gateway.models().chat(),
                        response.input_tokens,
                        response.output_tokens,
                    ),
                };
                (response.text, Delivery::Sync, Some(usage))
            }
        };

        if text.trim().is_empty() {
            warn!("Model returned an empty response for session {}", chat.session_id);
            return Err(Error::EmptyResponse);
        }

        let translated_response = if chat.language.is_default() {
            None
        } else {
            Some(
                self.translator
                    .translate_preserving_code(&text, chat.language)
                    .await,
            )
        };

        let findings = extract_findings(&text);
        let code_snippets = extract_code_snippets(&text, chat.file_path.as_deref());

        let timestamp = Utc::now();
        let message_id = format!("{}-{}", timestamp.timestamp_millis(), Uuid::new_v4().simple());

        self.persist(ConversationTurn {
            session_id: chat.session_id.clone(),
            message_id: message_id.clone(),
            repo_id: chat.repo_id.clone(),
            user_message: chat.message.clone(),
            model_response: text.clone(),
            language: chat.language,
            timestamp,
            ttl: timestamp.timestamp() + self.settings.conversation_ttl_days * SECONDS_PER_DAY,
        });

        info!(
            "Answered session {} ({:?}, {} findings, {} snippets) in {}ms",
            chat.session_id,
            delivery,
            findings.len(),
            code_snippets.len(),
            started.elapsed().as_millis()
        );

        Ok(ChatResponse {
            message_id,
            session_id: chat.session_id,
            repo_id: chat.repo_id,
            response: text,
            translated_response,
            language: chat.language,
            findings,
            code_snippets,
            delivery,
            timestamp,
            usage,
        })
    }

    /// History (chronological) and file context, fetched together. Either
    /// lookup failing degrades to nothing.
    async fn fetch_context(&self, chat: &ValidatedChat) -> (Vec<HistoryEntry>, Option<FileContext>) {
        let history = async {
            match self
                .context
                .recent_turns(&chat.session_id, self.settings.history_limit)
                .await
            {
                Ok(mut turns) => {
                    turns.reverse();
                    turns
                }
                Err(e) => {
                    warn!("History lookup failed for session {}: {}", chat.session_id, e);
                    Vec::new()
                }
            }
        };

        let file = async {
            let path = chat.file_path.as_deref()?;
            match self.context.file_context(&chat.repo_id, path).await {
                Ok(file) => file,
                Err(e) => {
                    warn!("File context lookup failed for {}/{}: {}", chat.repo_id, path, e);
                    None
                }
            }
        };

        tokio::join!(history, file)
    }

    /// Relay each chunk to the client as it arrives and return the full text.
    /// A `stream_end` frame is always sent, even when the stream fails.
    async fn relay_stream(
        &self,
        request: &ChatRequest,
        connection_id: &str,
        transport: &dyn TransportSink,
    ) -> Result<String> {
        let mut stream = self.gateway.invoke_chat_stream(request).await?;
        let mut text = String::new();
        let mut frames = 0usize;
        let mut outcome = Ok(());

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };
            if chunk.is_complete {
                break;
            }
            text.push_str(&chunk.text);
            let frame = StreamFrame::Token { content: chunk.text };
            send_frame(transport, connection_id, &frame).await;
            frames += 1;
        }

        send_frame(transport, connection_id, &StreamFrame::StreamEnd).await;
        info!(
            "Streamed {} frames ({} bytes) to connection {}",
            frames,
            text.len(),
            connection_id
        );

        outcome.map(|_| text)
    }

    fn persist(&self, turn: ConversationTurn) {
        let conversations = Arc::clone(&self.conversations);
        tokio::spawn(async move {
            if let Err(e) = conversations.put_turn(&turn).await {
                error!(
                    "Failed to persist turn {} of session {}: {}",
                    turn.message_id, turn.session_id, e
                );
            }
        });
    }
}

async fn send_frame(transport: &dyn TransportSink, connection_id: &str, frame: &StreamFrame) {
    let result = match frame.to_bytes() {
        Ok(bytes) => transport.send(connection_id, bytes).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!("Dropped frame for connection {}: {}", connection_id, e);
    }
}

/// Prior turns in order, then the new user message.
fn transcript(history: Vec<HistoryEntry>, message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 1);
    for entry in history {
        messages.push(ChatMessage::user(entry.user_message));
        messages.push(ChatMessage::assistant(entry.model_response));
    }
    messages.push(ChatMessage::user(message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FoundationModel, ModelSet};
    use crate::models::Severity;
    use crate::prompt::MENTOR_PERSONA;
    use crate::testing::{
        claude_reply, claude_stream, settle, FakeContextStore, FakeConversationStore, FakeRuntime,
        FakeTranslationApi, FakeTransport,
    };
    use crate::translate::Language;
    use serde_json::json;

    struct Harness {
        runtime: Arc<FakeRuntime>,
        context: Arc<FakeContextStore>,
        conversations: Arc<FakeConversationStore>,
        transport: Arc<FakeTransport>,
    }

    impl Harness {
        fn new(runtime: FakeRuntime) -> Self {
            Self {
                runtime: Arc::new(runtime),
                context: Arc::new(FakeContextStore::new()),
                conversations: Arc::new(FakeConversationStore::new()),
                transport: Arc::new(FakeTransport::new()),
            }
        }

        fn orchestrator(&self) -> ChatOrchestrator {
            ChatOrchestrator::new(
                Arc::new(ModelGateway::new(self.runtime.clone(), ModelSet::default())),
                Arc::new(Translator::new(Arc::new(FakeTranslationApi::new()))),
                self.context.clone(),
                self.conversations.clone(),
                ChatSettings::default(),
            )
        }

        fn streaming_orchestrator(&self) -> ChatOrchestrator {
            self.orchestrator().with_transport(self.transport.clone())
        }
    }

    fn request(message: &str) -> ChatApiRequest {
        ChatApiRequest {
            repo_id: "repo-42".to_string(),
            session_id: "session-7".to_string(),
            message: message.to_string(),
            ..ChatApiRequest::default()
        }
    }

    fn entry(user: &str, model: &str) -> HistoryEntry {
        HistoryEntry {
            user_message: user.to_string(),
            model_response: model.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sync_answer_with_usage_findings_and_persistence() {
        let reply = "[WARNING] Unbounded loop on line 3\n\nTry this:\n```rust\nfor item in items.iter().take(100) {}\n```";
        let harness = Harness::new(FakeRuntime::replying(claude_reply(reply)));

        let response = harness
            .orchestrator()
            .handle(request("Why does this hang?"))
            .await
            .unwrap();

        assert_eq!(response.response, reply);
        assert_eq!(response.delivery, Delivery::Sync);
        assert_eq!(response.language, Language::En);
        assert!(response.translated_response.is_none());
        assert_eq!(response.findings.len(), 1);
        assert_eq!(response.findings[0].severity, Severity::Warning);
        assert_eq!(response.findings[0].line, Some(3));
        assert_eq!(response.code_snippets.len(), 1);
        assert_eq!(response.code_snippets[0].explanation, "Try this:");

        let usage = response.usage.expect("sync responses carry usage");
        assert_eq!(usage.input_tokens, 1000);
        assert_eq!(usage.output_tokens, 200);
        assert_eq!(usage.cost, estimate_cost(FoundationModel::ClaudeSonnet35, 1000, 200));
        assert!((usage.cost.total_cost_usd - 0.006).abs() < 1e-9);

        settle().await;
        let turns = harness.conversations.turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].message_id, response.message_id);
        assert_eq!(turns[0].user_message, "Why does this hang?");
        assert_eq!(turns[0].model_response, reply);
        assert_eq!(turns[0].ttl, response.timestamp.timestamp() + 30 * 86_400);
    }

    #[tokio::test]
    async fn test_empty_model_response_is_an_error_and_not_persisted() {
        let harness = Harness::new(FakeRuntime::replying(claude_reply("  \n ")));

        let err = harness.orchestrator().handle(request("Hello?")).await.unwrap_err();

        assert!(matches!(err, Error::EmptyResponse));
        assert_eq!(err.status_code(), 500);
        settle().await;
        assert!(harness.conversations.turns().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_upstream_calls() {
        let harness = Harness::new(FakeRuntime::replying(claude_reply("unused")));
        let mut invalid = request("   ");
        invalid.repo_id = String::new();

        let err = harness.orchestrator().handle(invalid).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(harness.runtime.calls().is_empty());
        assert_eq!(harness.context.lookups(), 0);
    }

    #[tokio::test]
    async fn test_streaming_relays_tokens_in_order() {
        let harness = Harness::new(FakeRuntime::streaming(claude_stream(&["Use ", "a ", "set."])));
        let mut streamed = request("How do I dedupe?");
        streamed.connection_id = Some("conn-1".to_string());

        let response = harness.streaming_orchestrator().handle(streamed).await.unwrap();

        assert_eq!(response.response, "Use a set.");
        assert_eq!(response.delivery, Delivery::Streamed);
        assert!(response.usage.is_none());
        assert_eq!(
            harness.transport.frames(),
            vec![
                ("conn-1".to_string(), json!({"type": "token", "content": "Use "})),
                ("conn-1".to_string(), json!({"type": "token", "content": "a "})),
                ("conn-1".to_string(), json!({"type": "token", "content": "set."})),
                ("conn-1".to_string(), json!({"type": "stream_end"})),
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_failures_do_not_fail_the_request() {
        let mut harness = Harness::new(FakeRuntime::streaming(claude_stream(&["fine"])));
        harness.transport = Arc::new(FakeTransport::failing());
        let mut streamed = request("Is this ok?");
        streamed.connection_id = Some("conn-gone".to_string());

        let response = harness.streaming_orchestrator().handle(streamed).await.unwrap();

        assert_eq!(response.response, "fine");
        assert_eq!(response.delivery, Delivery::Streamed);
    }

    #[tokio::test]
    async fn test_connection_without_transport_falls_back_to_sync() {
        let harness = Harness::new(FakeRuntime::replying(claude_reply("Sync answer")));
        let mut with_connection = request("Question");
        with_connection.connection_id = Some("conn-1".to_string());

        let response = harness.orchestrator().handle(with_connection).await.unwrap();

        assert_eq!(response.delivery, Delivery::Sync);
        assert!(harness.transport.frames().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_sent_oldest_first() {
        let mut harness = Harness::new(FakeRuntime::replying(claude_reply("Third answer")));
        harness.context = Arc::new(FakeContextStore::new().with_history(vec![
            entry("second question", "second answer"),
            entry("first question", "first answer"),
        ]));

        harness.orchestrator().handle(request("third question")).await.unwrap();

        let calls = harness.runtime.calls();
        let contents: Vec<&str> = calls[0].1["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["content"].as_str().unwrap())
            .collect();
        assert_eq!(
            contents,
            vec![
                "first question",
                "first answer",
                "second question",
                "second answer",
                "third question"
            ]
        );
        assert_eq!(calls[0].1["messages"][1]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_file_context_grounds_the_prompt() {
        let mut harness = Harness::new(FakeRuntime::replying(claude_reply("Looks fine")));
        harness.context = Arc::new(FakeContextStore::new().with_file("def handler(event): pass"));
        let mut with_file = request("Review this");
        with_file.file_path = Some("app/handler.py".to_string());

        harness.orchestrator().handle(with_file).await.unwrap();

        let system = harness.runtime.calls()[0].1["system"].as_str().unwrap().to_string();
        assert!(system.starts_with(MENTOR_PERSONA));
        assert!(system.contains("app/handler.py"));
        assert!(system.contains("def handler(event): pass"));
        assert_eq!(harness.context.lookups(), 2);
        assert_eq!(harness.context.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_context_failures_degrade_to_no_context() {
        let mut harness = Harness::new(FakeRuntime::replying(claude_reply("Answer anyway")));
        harness.context = Arc::new(FakeContextStore::new().failing_history().failing_file());
        let mut with_file = request("Review this");
        with_file.file_path = Some("src/lib.rs".to_string());

        let response = harness.orchestrator().handle(with_file).await.unwrap();

        assert_eq!(response.response, "Answer anyway");
        assert_eq!(harness.context.lookups(), 2);
        let calls = harness.runtime.calls();
        assert_eq!(calls[0].1["system"], MENTOR_PERSONA);
        assert_eq!(calls[0].1["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_default_language_adds_translation() {
        let reply = "Add a guard:\n\n```python\nif not items:\n    return\n```\n";
        let harness = Harness::new(FakeRuntime::replying(claude_reply(reply)));
        let mut in_hindi = request("Fix my loop");
        in_hindi.language = Some("hi".to_string());

        let response = harness.orchestrator().handle(in_hindi).await.unwrap();

        assert_eq!(response.language, Language::Hi);
        assert_eq!(response.response, reply);
        assert_eq!(
            response.translated_response.as_deref(),
            Some("[hi] Add a guard:\n\n```python\nif not items:\n    return\n```\n")
        );
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_surfaced() {
        let mut harness = Harness::new(FakeRuntime::replying(claude_reply("Stored or not")));
        harness.conversations = Arc::new(FakeConversationStore::failing());

        let response = harness.orchestrator().handle(request("Hi")).await;
        settle().await;

        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_invocation_error() {
        let harness = Harness::new(FakeRuntime::failing("ThrottlingException"));
        let err = harness.orchestrator().handle(request("Hi")).await.unwrap_err();
        assert!(matches!(err, Error::Invocation { .. }));
        settle().await;
        assert!(harness.conversations.turns().is_empty());
    }
}
