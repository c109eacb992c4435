//! Session configuration and the language table

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_VOICE;
use crate::remote::{ConnectConfig, ResponseModality};

/// A practice language offered by the UI shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
    pub native_name: String,
}

impl Language {
    pub fn new(code: &str, name: &str, native_name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            native_name: native_name.to_string(),
        }
    }
}

/// Languages the conversational endpoint is asked to tutor in.
pub fn supported_languages() -> Vec<Language> {
    vec![
        Language::new("en", "English", "English"),
        Language::new("sw", "Swahili", "Kiswahili"),
        Language::new("fr", "French", "Français"),
        Language::new("rw", "Kinyarwanda", "Ikinyarwanda"),
    ]
}

/// Immutable configuration for one conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub language: Language,
    pub voice: String,
}

impl SessionConfig {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            voice: DEFAULT_VOICE.to_string(),
        }
    }

    /// Natural-language instruction describing the desired tutoring
    /// behavior and fluency for the session's language.
    pub fn system_instruction(&self) -> String {
        format!(
            "You are a patient, encouraging language practice assistant. \
             Your mission: help the user improve their speaking skills in {name} ({native}). \
             Speak {name} with native-level fluency and a perfectly natural accent. \
             Do not mix languages unless the user specifically asks for a translation. \
             If the user makes a mistake in {name}, gently correct them after responding \
             to their intent.",
            name = self.language.name,
            native = self.language.native_name,
        )
    }

    pub fn connect_config(&self) -> ConnectConfig {
        ConnectConfig {
            system_instruction: self.system_instruction(),
            voice: self.voice.clone(),
            response_modality: ResponseModality::Audio,
        }
    }
}
