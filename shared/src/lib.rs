//! Shared library for the Code Mentor Lambda functions.
//!
//! Holds the model gateway, translation, batch embedding and the chat
//! pipeline, plus the storage and transport clients they are wired to.

pub mod config;
pub mod embedder;
pub mod error;
pub mod findings;
pub mod gateway;
pub mod http;
pub mod markdown;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod store;
pub mod translate;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use embedder::{BatchEmbedder, BatchSettings};
pub use error::{Error, Result};
pub use gateway::{estimate_cost, BedrockRuntime, CostEstimate, ModelGateway, ModelSet};
pub use models::{ChatApiRequest, ChatResponse, MentorReview, TranslatedMentorReview};
pub use orchestrator::{ChatOrchestrator, ChatSettings};
pub use store::DynamoStore;
pub use translate::{AwsTranslation, Language, Translator};
pub use transport::WebSocketSink;
