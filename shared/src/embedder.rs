//! Bulk embedding with a hard ceiling on concurrent upstream calls.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::gateway::{EmbeddingDimensions, EmbeddingRequest, EmbeddingResponse, ModelGateway};

pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    /// Window size; never more than this many calls are in flight.
    pub concurrency: usize,
    pub dimensions: EmbeddingDimensions,
    pub normalize: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            dimensions: EmbeddingDimensions::default(),
            normalize: true,
        }
    }
}

pub struct BatchEmbedder {
    gateway: Arc<ModelGateway>,
}

impl BatchEmbedder {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Embed every document, keyed by id.
    ///
    /// Documents are processed in windows of `settings.concurrency`; a window
    /// must fully settle before the next one starts. Failed documents are
    /// logged and left out of the result, they never abort the batch.
    pub async fn embed_all(
        &self,
        documents: impl IntoIterator<Item = (String, String)>,
        settings: BatchSettings,
    ) -> HashMap<String, EmbeddingResponse> {
        let documents: Vec<(String, String)> = documents.into_iter().collect();
        let window_size = settings.concurrency.max(1);
        let mut embeddings = HashMap::with_capacity(documents.len());

        for (window_index, window) in documents.chunks(window_size).enumerate() {
            let settled = join_all(window.iter().map(|(id, text)| async move {
                let request = EmbeddingRequest {
                    text: text.clone(),
                    dimensions: settings.dimensions,
                    normalize: settings.normalize,
                };
                (id, self.gateway.invoke_embedding(&request).await)
            }))
            .await;

            for (id, outcome) in settled {
                match outcome {
                    Ok(response) => {
                        embeddings.insert(id.clone(), response);
                    }
                    Err(e) => warn!("Skipping document {} in window {}: {}", id, window_index, e),
                }
            }
        }

        info!(
            "Embedded {} of {} documents",
            embeddings.len(),
            documents.len()
        );
        embeddings
    }
}
