//! Language utilities for the supported target languages
//!
//! This module holds the catalogue of target languages the pipeline accepts,
//! the per-language translation route, and ISO 639-1 helpers for naming
//! languages in prompts.

use anyhow::{Result, anyhow};
use isolang::Language;

/// Which backend serves a target language.
///
/// Adding a language or moving it to another backend is an edit to
/// [`LANGUAGES`], never to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Served by the primary backend
    Primary,
    /// Served by the secondary backend; degrades when it is unavailable
    Secondary,
    /// No backend; segments are returned untranslated and flagged
    Degrade,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Primary => write!(f, "primary"),
            Route::Secondary => write!(f, "secondary"),
            Route::Degrade => write!(f, "degrade"),
        }
    }
}

/// Availability shown to API callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Limited,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::Limited => write!(f, "limited"),
        }
    }
}

/// One entry of the target language catalogue
#[derive(Debug, Clone, Copy)]
pub struct SupportedLanguage {
    /// ISO 639-1 code used by the API
    pub code: &'static str,
    /// English display name
    pub name: &'static str,
    /// Native display name
    pub native: &'static str,
    /// Translation route
    pub route: Route,
    /// Code understood by the secondary backend
    pub secondary_code: &'static str,
}

impl SupportedLanguage {
    /// Languages without a primary route are offered with limited quality
    pub fn availability(&self) -> Availability {
        match self.route {
            Route::Primary => Availability::Available,
            Route::Secondary | Route::Degrade => Availability::Limited,
        }
    }
}

/// All target languages the pipeline accepts
pub const LANGUAGES: &[SupportedLanguage] = &[
    SupportedLanguage { code: "es", name: "Spanish", native: "Español", route: Route::Primary, secondary_code: "es" },
    SupportedLanguage { code: "pt", name: "Portuguese", native: "Português", route: Route::Primary, secondary_code: "pt" },
    SupportedLanguage { code: "ht", name: "Haitian Creole", native: "Kreyòl ayisyen", route: Route::Secondary, secondary_code: "ht" },
    SupportedLanguage { code: "zh", name: "Chinese (Simplified)", native: "中文", route: Route::Primary, secondary_code: "zh-CN" },
    SupportedLanguage { code: "ko", name: "Korean", native: "한국어", route: Route::Primary, secondary_code: "ko" },
    SupportedLanguage { code: "ar", name: "Arabic", native: "العربية", route: Route::Primary, secondary_code: "ar" },
    SupportedLanguage { code: "fr", name: "French", native: "Français", route: Route::Primary, secondary_code: "fr" },
    SupportedLanguage { code: "pl", name: "Polish", native: "Polski", route: Route::Primary, secondary_code: "pl" },
    SupportedLanguage { code: "hi", name: "Hindi", native: "हिन्दी", route: Route::Secondary, secondary_code: "hi" },
    SupportedLanguage { code: "ur", name: "Urdu", native: "اردو", route: Route::Secondary, secondary_code: "ur" },
];

/// Look up a supported target language by code
pub fn find_language(code: &str) -> Option<&'static SupportedLanguage> {
    let normalized = code.trim().to_lowercase();
    LANGUAGES.iter().find(|l| l.code == normalized)
}

/// Whether the code is one of the supported target languages
pub fn is_supported_target(code: &str) -> bool {
    find_language(code).is_some()
}

/// Sorted, comma separated list of supported codes (for error messages)
pub fn supported_codes() -> String {
    let mut codes: Vec<&str> = LANGUAGES.iter().map(|l| l.code).collect();
    codes.sort_unstable();
    codes.join(", ")
}

/// Route for a target language, `None` when unsupported
pub fn route_for(code: &str) -> Option<Route> {
    find_language(code).map(|l| l.route)
}

/// Validate if a language code is a valid ISO 639-1 code
pub fn validate_language_code(code: &str) -> Result<()> {
    let normalized_code = code.trim().to_lowercase();
    if normalized_code.len() == 2 && Language::from_639_1(&normalized_code).is_some() {
        return Ok(());
    }
    Err(anyhow!("Invalid language code: {}", code))
}

/// Get the English name of a language, preferring the catalogue name for
/// supported targets
pub fn get_language_name(code: &str) -> Result<String> {
    if let Some(language) = find_language(code) {
        return Ok(language.name.to_string());
    }

    let normalized_code = code.trim().to_lowercase();
    Language::from_639_1(&normalized_code)
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Language pair key used by reviewers and glossaries, e.g. `en-es`
pub fn language_pair(source: &str, target: &str) -> String {
    format!("{}-{}", source.trim().to_lowercase(), target.trim().to_lowercase())
}
