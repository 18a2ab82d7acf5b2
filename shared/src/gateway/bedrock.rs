//! Bedrock Runtime transport for the gateway.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_sdk_bedrockruntime::Client as BedrockClient;

use super::{FrameStream, ModelRuntime};
use crate::{Error, Result};

/// Client handle shared by every request in the process.
#[derive(Clone)]
pub struct BedrockRuntime {
    client: BedrockClient,
}

impl BedrockRuntime {
    pub fn new(client: BedrockClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModelRuntime for BedrockRuntime {
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let response = self
            .client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to invoke {}: {}", model_id, e)))?;

        Ok(response.body().as_ref().to_vec())
    }

    async fn invoke_stream(&self, model_id: &str, body: Vec<u8>) -> Result<Option<FrameStream>> {
        let response = self
            .client
            .invoke_model_with_response_stream()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to open stream for {}: {}", model_id, e)))?;

        // One upstream event per poll.
        let frames = futures::stream::unfold(response.body, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(Some(ResponseStream::Chunk(part))) => {
                        if let Some(bytes) = part.bytes() {
                            let frame = bytes.as_ref().to_vec();
                            return Some((Ok(frame), receiver));
                        }
                    }
                    Ok(Some(_)) => continue,
                    Ok(None) => return None,
                    Err(e) => {
                        let err = Error::Aws(format!("Response stream failed: {}", e));
                        return Some((Err(err), receiver));
                    }
                }
            }
        });

        Ok(Some(Box::pin(frames)))
    }
}
