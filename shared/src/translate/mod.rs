//! Translation of mentor output.
//!
//! Amazon Translate rejects any request above [`MAX_REQUEST_BYTES`], so larger
//! texts are chunked on paragraph boundaries before they hit the wire. Code is
//! never sent for translation: review code snippets are copied through and
//! fenced blocks in free-form answers are skipped.

mod aws;
mod chunking;
mod language;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::markdown::{self, Segment};
use crate::models::{MentorReview, TranslatedMentorReview};
use crate::{Error, Result};

pub use aws::AwsTranslation;
pub use chunking::{prefix_within, split_paragraphs, PARAGRAPH_SEPARATOR};
pub use language::Language;

/// Hard per-request limit of the translation API, in UTF-8 bytes.
pub const MAX_REQUEST_BYTES: usize = 10_000;

/// Chunk budget, leaving headroom below [`MAX_REQUEST_BYTES`].
pub const CHUNK_BYTES: usize = 8_000;

/// How much text is sent for language detection.
const DETECTION_SAMPLE_BYTES: usize = 4_500;

/// Candidate language reported by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLanguage {
    pub code: String,
    pub score: f32,
}

/// Wire client for translation and language detection.
#[async_trait]
pub trait TranslationApi: Send + Sync {
    async fn translate_text(&self, text: &str, source: Language, target: Language) -> Result<String>;

    async fn detect_dominant_language(&self, text: &str) -> Result<Vec<DetectedLanguage>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationUnit {
    pub source_text: String,
    pub source_language: Language,
    pub target_language: Language,
    pub translated_text: String,
    pub character_count: usize,
    pub latency_ms: u64,
}

impl TranslationUnit {
    fn identity(text: &str, source: Language, target: Language) -> Self {
        Self {
            source_text: text.to_string(),
            source_language: source,
            target_language: target,
            translated_text: text.to_string(),
            character_count: text.chars().count(),
            latency_ms: 0,
        }
    }
}

/// Result of fanning one text out to several languages.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTranslation {
    pub results: HashMap<Language, TranslationUnit>,
    pub failed_languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageDetection {
    pub detected_language: String,
    pub score: f32,
}

impl LanguageDetection {
    fn fallback() -> Self {
        Self {
            detected_language: Language::default().code().to_string(),
            score: 0.0,
        }
    }
}

pub struct Translator {
    api: Arc<dyn TranslationApi>,
}

impl Translator {
    pub fn new(api: Arc<dyn TranslationApi>) -> Self {
        Self { api }
    }

    /// Translate `text` from `source` into `target`.
    pub async fn translate(
        &self,
        text: &str,
        target: Language,
        source: Language,
    ) -> Result<TranslationUnit> {
        if source == target || text.trim().is_empty() {
            return Ok(TranslationUnit::identity(text, source, target));
        }
        if text.len() > MAX_REQUEST_BYTES {
            return Ok(self.translate_chunked(text, target, source).await);
        }

        let started = Instant::now();
        let translated_text = self.call(text, source, target).await?;

        Ok(TranslationUnit {
            source_text: text.to_string(),
            source_language: source,
            target_language: target,
            translated_text,
            character_count: text.chars().count(),
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn call(&self, text: &str, source: Language, target: Language) -> Result<String> {
        self.api
            .translate_text(text, source, target)
            .await
            .map_err(|e| Error::Translation {
                target_language: target.code().to_string(),
                cause: e.to_string(),
            })
    }

    async fn translate_chunked(&self, text: &str, target: Language, source: Language) -> TranslationUnit {
        let started = Instant::now();
        let chunks = split_paragraphs(text, CHUNK_BYTES);
        info!(
            "Translating {} bytes to {} in {} chunks",
            text.len(),
            target,
            chunks.len()
        );

        let translated = join_all(chunks.iter().enumerate().map(|(index, chunk)| async move {
            if chunk.trim().is_empty() {
                return chunk.clone();
            }
            match self.call(chunk, source, target).await {
                Ok(translated) => translated,
                Err(e) => {
                    warn!("Chunk {} kept untranslated: {}", index, e);
                    chunk.clone()
                }
            }
        }))
        .await;

        TranslationUnit {
            source_text: text.to_string(),
            source_language: source,
            target_language: target,
            translated_text: translated.join(PARAGRAPH_SEPARATOR),
            character_count: text.chars().count(),
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Translate from the default language, returning the original text on
    /// failure.
    async fn translate_or_original(&self, text: &str, target: Language) -> String {
        match self.translate(text, target, Language::default()).await {
            Ok(unit) => unit.translated_text,
            Err(e) => {
                warn!("Falling back to original text: {}", e);
                text.to_string()
            }
        }
    }

    /// Translate the prose fields of a review. Severity and code are copied
    /// unchanged and each prose field falls back on its own.
    pub async fn translate_review(&self, review: &MentorReview, target: Language) -> TranslatedMentorReview {
        if target.is_default() {
            return TranslatedMentorReview {
                summary: review.summary.clone(),
                explanation: review.explanation.clone(),
                suggestion: review.suggestion.clone(),
                severity: review.severity,
                code_snippet: review.code_snippet.clone(),
                language: target,
                latency_ms: 0,
            };
        }

        let started = Instant::now();
        let (summary, explanation, suggestion) = tokio::join!(
            self.translate_or_original(&review.summary, target),
            self.translate_or_original(&review.explanation, target),
            self.translate_or_original(&review.suggestion, target),
        );

        TranslatedMentorReview {
            summary,
            explanation,
            suggestion,
            severity: review.severity,
            code_snippet: review.code_snippet.clone(),
            language: target,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Translate one text into every language in `targets` concurrently.
    /// Unsupported codes and failed calls are reported in `failed_languages`
    /// in the order given.
    pub async fn translate_to_many(&self, text: &str, targets: &[String]) -> MultiTranslation {
        let outcomes = join_all(targets.iter().map(|code| async move {
            let outcome = match Language::from_code(code) {
                Some(language) => self.translate(text, language, Language::default()).await,
                None => Err(Error::Translation {
                    target_language: code.clone(),
                    cause: "unsupported language".to_string(),
                }),
            };
            (code, outcome)
        }))
        .await;

        let mut batch = MultiTranslation::default();
        for (code, outcome) in outcomes {
            match outcome {
                Ok(unit) => {
                    batch.results.insert(unit.target_language, unit);
                }
                Err(e) => {
                    warn!("Translation fan-out: {}", e);
                    batch.failed_languages.push(code.clone());
                }
            }
        }
        batch
    }

    /// Translate a markdown answer, leaving fenced code blocks untouched.
    pub async fn translate_preserving_code(&self, text: &str, target: Language) -> String {
        if target.is_default() {
            return text.to_string();
        }

        let parts = join_all(markdown::segments(text).into_iter().map(|segment| async move {
            match segment {
                Segment::Code(block) => block.raw.to_string(),
                Segment::Prose(prose) => {
                    let core = prose.trim();
                    if core.is_empty() {
                        return prose.to_string();
                    }
                    let lead = &prose[..prose.len() - prose.trim_start().len()];
                    let trail = &prose[lead.len() + core.len()..];
                    let translated = self.translate_or_original(core, target).await;
                    format!("{}{}{}", lead, translated, trail)
                }
            }
        }))
        .await;

        parts.concat()
    }

    /// Best-effort dominant language of `text`. Never fails: any problem
    /// yields the default language with a zero score.
    pub async fn detect_language(&self, text: &str) -> LanguageDetection {
        if text.trim().is_empty() {
            return LanguageDetection::fallback();
        }

        let sample = prefix_within(text, DETECTION_SAMPLE_BYTES);
        match self.api.detect_dominant_language(sample).await {
            Ok(candidates) => candidates
                .into_iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .map(|best| LanguageDetection {
                    detected_language: best.code,
                    score: best.score.clamp(0.0, 1.0),
                })
                .unwrap_or_else(|| {
                    debug!("Detector returned no candidates");
                    LanguageDetection::fallback()
                }),
            Err(e) => {
                warn!("Language detection failed: {}", e);
                LanguageDetection::fallback()
            }
        }
    }
}
