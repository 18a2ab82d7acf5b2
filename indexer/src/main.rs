//! Indexer Lambda - Embeds repository files in bulk.
//!
//! Invoked with `{documents: {id: text}, concurrency?, dimensions?, normalize?}`
//! and returns the embeddings keyed by id along with the ids that failed.

use std::collections::HashMap;
use std::sync::Arc;

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use shared::config::{embedding_model_from_env, load_sdk_config, region_from_env};
use shared::gateway::{EmbeddingDimensions, EmbeddingResponse, FoundationModel};
use shared::{estimate_cost, BatchEmbedder, BatchSettings, BedrockRuntime, ModelGateway, ModelSet};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexRequest {
    documents: HashMap<String, String>,
    concurrency: Option<usize>,
    dimensions: Option<EmbeddingDimensions>,
    normalize: Option<bool>,
}

impl IndexRequest {
    fn settings(&self) -> BatchSettings {
        let defaults = BatchSettings::default();
        BatchSettings {
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            dimensions: self.dimensions.unwrap_or(defaults.dimensions),
            normalize: self.normalize.unwrap_or(defaults.normalize),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexResponse {
    embeddings: HashMap<String, Vec<f32>>,
    failed: Vec<String>,
    input_tokens: u32,
    cost_usd: f64,
}

/// Application state
struct AppState {
    embedder: BatchEmbedder,
    model: FoundationModel,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = load_sdk_config(&region_from_env()).await;
        let models = ModelSet::default().with_embedding(embedding_model_from_env()?)?;

        let runtime = BedrockRuntime::new(aws_sdk_bedrockruntime::Client::new(&config));
        let gateway = Arc::new(ModelGateway::new(Arc::new(runtime), models));

        Ok(Self {
            embedder: BatchEmbedder::new(gateway),
            model: models.embedding(),
        })
    }
}

/// Ids without an embedding are reported as failed, sorted.
fn summarize(
    ids: Vec<String>,
    embedded: HashMap<String, EmbeddingResponse>,
    model: FoundationModel,
) -> IndexResponse {
    let mut failed: Vec<String> = ids
        .into_iter()
        .filter(|id| !embedded.contains_key(id))
        .collect();
    failed.sort();

    let input_tokens = embedded.values().map(|e| e.input_tokens).sum();
    let embeddings = embedded
        .into_iter()
        .map(|(id, response)| (id, response.embedding))
        .collect();

    IndexResponse {
        embeddings,
        failed,
        input_tokens,
        cost_usd: estimate_cost(model, input_tokens, 0).total_cost_usd,
    }
}

async fn handler(state: Arc<AppState>, event: LambdaEvent<IndexRequest>) -> Result<IndexResponse, Error> {
    let request = event.payload;
    let settings = request.settings();
    let ids: Vec<String> = request.documents.keys().cloned().collect();

    info!(
        "Indexing {} documents with concurrency {}",
        ids.len(),
        settings.concurrency
    );

    let embedded = state.embedder.embed_all(request.documents, settings).await;
    let response = summarize(ids, embedded, state.model);

    info!(
        "Indexed {} documents, {} failed, {} input tokens",
        response.embeddings.len(),
        response.failed.len(),
        response.input_tokens
    );
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
