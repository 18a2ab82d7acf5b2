use std::fmt;

use serde::{Deserialize, Serialize};

/// Languages the mentor can answer in. English is the source language of
/// every model response.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Bn,
    Ta,
    Te,
    Mr,
    Gu,
    Kn,
    Ml,
    Pa,
    Ur,
}

impl Language {
    pub const ALL: [Language; 11] = [
        Language::En,
        Language::Hi,
        Language::Bn,
        Language::Ta,
        Language::Te,
        Language::Mr,
        Language::Gu,
        Language::Kn,
        Language::Ml,
        Language::Pa,
        Language::Ur,
    ];

    /// ISO 639-1 code as understood by Amazon Translate.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Bn => "bn",
            Language::Ta => "ta",
            Language::Te => "te",
            Language::Mr => "mr",
            Language::Gu => "gu",
            Language::Kn => "kn",
            Language::Ml => "ml",
            Language::Pa => "pa",
            Language::Ur => "ur",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Hi => "Hindi",
            Language::Bn => "Bengali",
            Language::Ta => "Tamil",
            Language::Te => "Telugu",
            Language::Mr => "Marathi",
            Language::Gu => "Gujarati",
            Language::Kn => "Kannada",
            Language::Ml => "Malayalam",
            Language::Pa => "Punjabi",
            Language::Ur => "Urdu",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|language| language.code() == code)
    }

    pub fn is_default(&self) -> bool {
        *self == Language::default()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
