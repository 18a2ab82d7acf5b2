use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_comprehend::Client as ComprehendClient;
use aws_sdk_translate::Client as TranslateClient;

use super::{DetectedLanguage, Language, TranslationApi};
use crate::{Error, Result};

/// Amazon Translate for text, Amazon Comprehend for language detection.
#[derive(Clone)]
pub struct AwsTranslation {
    translate: TranslateClient,
    comprehend: ComprehendClient,
}

impl AwsTranslation {
    pub fn new(translate: TranslateClient, comprehend: ComprehendClient) -> Self {
        Self {
            translate,
            comprehend,
        }
    }

    pub fn from_sdk_config(config: &SdkConfig) -> Self {
        Self::new(TranslateClient::new(config), ComprehendClient::new(config))
    }
}

#[async_trait]
impl TranslationApi for AwsTranslation {
    async fn translate_text(&self, text: &str, source: Language, target: Language) -> Result<String> {
        let response = self
            .translate
            .translate_text()
            .text(text)
            .source_language_code(source.code())
            .target_language_code(target.code())
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to translate text: {}", e)))?;

        Ok(response.translated_text().to_string())
    }

    async fn detect_dominant_language(&self, text: &str) -> Result<Vec<DetectedLanguage>> {
        let response = self
            .comprehend
            .detect_dominant_language()
            .text(text)
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to detect language: {}", e)))?;

        Ok(response
            .languages()
            .iter()
            .filter_map(|candidate| {
                Some(DetectedLanguage {
                    code: candidate.language_code()?.to_string(),
                    score: candidate.score().unwrap_or(0.0),
                })
            })
            .collect())
    }
}
