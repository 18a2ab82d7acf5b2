//! Translation Lambda - Localizes mentor output.
//!
//! Endpoints:
//! - POST /v1/translate - Translate text into one language
//! - POST /v1/translate/batch - Translate text into several languages
//! - POST /v1/translate/review - Translate a structured review
//! - POST /v1/detect-language - Detect the dominant language of text

use std::sync::Arc;

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Deserialize;
use shared::config::{load_sdk_config, region_from_env};
use shared::http::{bad_request, error_response, json_response, ok_response, ApiResponse};
use shared::{AwsTranslation, Language, MentorReview, Translator};
use tracing::info;
use tracing_subscriber::EnvFilter;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest {
    #[validate(length(min = 1, message = "text is required"))]
    text: String,
    target_language: String,
    source_language: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct BatchTranslateRequest {
    #[validate(length(min = 1, message = "text is required"))]
    text: String,
    #[validate(length(min = 1, message = "at least one target language is required"))]
    target_languages: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewTranslateRequest {
    review: MentorReview,
    target_language: String,
}

#[derive(Debug, Deserialize)]
struct DetectLanguageRequest {
    text: String,
}

/// Application state
struct AppState {
    translator: Translator,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = load_sdk_config(&region_from_env()).await;
        let translator = Translator::new(Arc::new(AwsTranslation::from_sdk_config(&config)));

        Ok(Self { translator })
    }
}

/// Resolve a language code, or a 400 response for unsupported codes.
fn language_param(code: &str) -> Result<Result<Language, Response<Body>>, Error> {
    match Language::from_code(code) {
        Some(language) => Ok(Ok(language)),
        None => Ok(Err(bad_request(format!("Unsupported language: {}", code))?)),
    }
}

fn validation_message(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .filter_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .collect::<Vec<_>>()
        .join("; ")
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str();
    let path = event.uri().path();

    info!("Translate request: {} {}", method, path);

    match (method, path) {
        ("POST", "/v1/translate") => {
            let request: TranslateRequest = shared::parse_body!(event.body());
            if let Err(e) = request.validate() {
                return bad_request(validation_message(&e));
            }
            let target = match language_param(&request.target_language)? {
                Ok(language) => language,
                Err(response) => return Ok(response),
            };
            let source = match request.source_language.as_deref() {
                Some(code) => match language_param(code)? {
                    Ok(language) => language,
                    Err(response) => return Ok(response),
                },
                None => Language::default(),
            };

            match state.translator.translate(&request.text, target, source).await {
                Ok(unit) => ok_response(unit),
                Err(e) => error_response(&e),
            }
        }

        ("POST", "/v1/translate/batch") => {
            let request: BatchTranslateRequest = shared::parse_body!(event.body());
            if let Err(e) = request.validate() {
                return bad_request(validation_message(&e));
            }

            let batch = state
                .translator
                .translate_to_many(&request.text, &request.target_languages)
                .await;
            info!(
                "Translated into {} languages, {} failed",
                batch.results.len(),
                batch.failed_languages.len()
            );
            ok_response(batch)
        }

        ("POST", "/v1/translate/review") => {
            let request: ReviewTranslateRequest = shared::parse_body!(event.body());
            let target = match language_param(&request.target_language)? {
                Ok(language) => language,
                Err(response) => return Ok(response),
            };

            ok_response(state.translator.translate_review(&request.review, target).await)
        }

        ("POST", "/v1/detect-language") => {
            let request: DetectLanguageRequest = shared::parse_body!(event.body());
            ok_response(state.translator.detect_language(&request.text).await)
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
