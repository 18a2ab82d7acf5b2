//! Mentor Chat Lambda - Answers code questions grounded in repository context.
//!
//! Endpoints:
//! - POST /v1/chat - Ask the mentor a question
//!
//! Requests carrying a `connectionId` are streamed to that WebSocket
//! connection when `WEBSOCKET_ENDPOINT` is configured.

use std::sync::Arc;

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::config::load_sdk_config;
use shared::http::{error_response, json_response, ok_response, ApiResponse};
use shared::{
    AwsTranslation, BedrockRuntime, ChatApiRequest, ChatOrchestrator, ChatSettings, Config,
    DynamoStore, ModelGateway, Translator, WebSocketSink,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState {
    orchestrator: ChatOrchestrator,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let sdk_config = load_sdk_config(&config.aws_region).await;

        let runtime = BedrockRuntime::new(aws_sdk_bedrockruntime::Client::new(&sdk_config));
        let gateway = Arc::new(ModelGateway::new(Arc::new(runtime), config.model_set()?));
        let translator = Arc::new(Translator::new(Arc::new(AwsTranslation::from_sdk_config(
            &sdk_config,
        ))));
        let store = Arc::new(DynamoStore::new(
            aws_sdk_dynamodb::Client::new(&sdk_config),
            config.conversations_table.clone(),
            config.file_context_table.clone(),
        ));

        let mut orchestrator = ChatOrchestrator::new(
            gateway,
            translator,
            store.clone(),
            store,
            ChatSettings::from(&config),
        );
        if let Some(endpoint) = &config.websocket_endpoint {
            info!("Streaming enabled via {}", endpoint);
            orchestrator = orchestrator.with_transport(Arc::new(WebSocketSink::new(&sdk_config, endpoint)));
        }

        Ok(Self { orchestrator })
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str();
    let path = event.uri().path();

    info!("Chat request: {} {}", method, path);

    match (method, path) {
        ("POST", "/v1/chat") => {
            let request: ChatApiRequest = shared::parse_body!(event.body());

            match state.orchestrator.handle(request).await {
                Ok(response) => ok_response(response),
                Err(e) => error_response(&e),
            }
        }

        _ => json_response(404, &ApiResponse::<()>::error("NotFound", "Not found")),
    }
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
