//! Push delivery of streamed tokens to WebSocket clients.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_apigatewaymanagement::primitives::Blob;
use aws_sdk_apigatewaymanagement::Client as ManagementClient;
use serde::Serialize;

use crate::{Error, Result};

/// Frame pushed to a connected client while a response streams.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    Token { content: String },
    StreamEnd,
}

impl StreamFrame {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[async_trait]
pub trait TransportSink: Send + Sync {
    async fn send(&self, connection_id: &str, frame: Vec<u8>) -> Result<()>;
}

/// API Gateway WebSocket connections via the management API.
#[derive(Clone)]
pub struct WebSocketSink {
    client: ManagementClient,
}

impl WebSocketSink {
    /// `endpoint` is the `https://{api-id}.execute-api.{region}.amazonaws.com/{stage}`
    /// callback URL of the WebSocket API.
    pub fn new(config: &SdkConfig, endpoint: &str) -> Self {
        let conf = aws_sdk_apigatewaymanagement::config::Builder::from(config)
            .endpoint_url(endpoint)
            .build();
        Self {
            client: ManagementClient::from_conf(conf),
        }
    }
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&self, connection_id: &str, frame: Vec<u8>) -> Result<()> {
        self.client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(frame))
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to post to connection {}: {}", connection_id, e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shapes() {
        let token = StreamFrame::Token {
            content: "fn".to_string(),
        };
        assert_eq!(token.to_bytes().unwrap(), br#"{"type":"token","content":"fn"}"#.to_vec());
        assert_eq!(StreamFrame::StreamEnd.to_bytes().unwrap(), br#"{"type":"stream_end"}"#.to_vec());
    }
}
