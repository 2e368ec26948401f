/*!
 * Prompt templates for article translation and scoring.
 *
 * The translator receives a JSON request holding the batch of segment
 * texts and must answer with a JSON object whose `translations` array has
 * the same length and order.
 */

use serde::{Deserialize, Serialize};

use crate::language_utils::get_language_name;

/// Newsroom style guide injected for Spanish targets.
pub const SPANISH_STYLE_RULES: &str = r#"## Spanish newsroom style guide

QUOTES
- Use Latin quotation marks « » for direct quotes; nested quotes use " ".
- Attribute quotes with neutral verbs: prefer "dijo" or "expresó" over "afirmó" or "aseguró".

ACRONYMS
- Keep the English acronym when no Spanish one is established and spell it out on first use.
- Do not pluralise acronyms with a final "s" (las ONG, not las ONGs).

NUMBERS
- Use a period for thousands and a comma for decimals (1.500,75).
- "billion" is "mil millones"; "billón" means a million millions and is only used for that value.
- Write out numbers from one to nine; use digits from 10 upward.

UNITED STATES
- Abbreviate as "EE. UU." with the space; write "Estados Unidos" in headlines.

MEASUREMENTS
- Keep imperial units as published and add the metric conversion in parentheses on first use.

STATE NAMES
- Use the Spanish form where one exists (Nueva York, Carolina del Norte, Nuevo México); otherwise keep the English name.

IMMIGRATION TERMS
- "humanitarian parole" is "permiso humanitario"; never translate "undocumented" as "ilegal"."#;

/// Formatting rules shared by every target language.
pub const GENERIC_FORMAT_RULES: &str = r#"## Format rules
- Keep currency amounts with their original symbol and convert number separators to the target locale.
- Keep units of measure as published; do not convert silently.
- Keep acronyms of organisations unless the target language has an established form.
- Do not add, drop or merge sentences.
- Return plain text only; no markup, no notes."#;

/// Style guide for a target language, if one exists
pub fn style_rules_for(target_language: &str) -> Option<&'static str> {
    match target_language.trim().to_lowercase().as_str() {
        "es" => Some(SPANISH_STYLE_RULES),
        _ => None,
    }
}

/// System prompt template for article translation.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default system prompt for news article translation.
    pub const ARTICLE_TRANSLATOR: &'static str = r#"You are a professional news translator working from {source_language} into {target_language} for a community newsroom.

## Your Role
- Translate each segment faithfully, preserving meaning, tone and attribution
- Use natural, idiomatic {target_language} suited to a general news audience
- Keep names of people and organisations unchanged

## Output Requirements
- Return ONLY valid JSON of the form {"translations": ["...", "..."]}
- The translations array must have exactly one entry per input segment, in the same order
- Do not include any text outside the JSON structure"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default article translator template.
    pub fn article_translator() -> Self {
        Self::new(Self::ARTICLE_TRANSLATOR)
    }

    /// Render the template with the given language names.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::article_translator()
    }
}

/// Builder for one batch's translation prompt.
#[derive(Debug, Clone)]
pub struct TranslationPromptBuilder {
    source_language: String,
    target_language: String,
    segments: Vec<String>,
}

impl TranslationPromptBuilder {
    /// Create a builder for a language pair (ISO 639-1 codes).
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.trim().to_lowercase(),
            target_language: target_language.trim().to_lowercase(),
            segments: Vec::new(),
        }
    }

    /// Set the batch of segment texts.
    pub fn with_segments(mut self, segments: &[String]) -> Self {
        self.segments = segments.to_vec();
        self
    }

    fn display_name(code: &str) -> String {
        get_language_name(code).unwrap_or_else(|_| code.to_string())
    }

    /// Build the system prompt.
    pub fn build_system_prompt(&self) -> String {
        let mut prompt = PromptTemplate::article_translator().render(
            &Self::display_name(&self.source_language),
            &Self::display_name(&self.target_language),
        );

        prompt.push_str("\n\n");
        prompt.push_str(GENERIC_FORMAT_RULES);

        if let Some(rules) = style_rules_for(&self.target_language) {
            prompt.push_str("\n\n");
            prompt.push_str(rules);
        }

        prompt
    }

    /// Build the user prompt as a JSON request.
    pub fn build_user_prompt(&self) -> String {
        let request = TranslationRequest {
            task: "translate_segments".to_string(),
            source_language: Self::display_name(&self.source_language),
            target_language: Self::display_name(&self.target_language),
            segment_count: self.segments.len(),
            segments: self.segments.clone(),
        };

        serde_json::to_string_pretty(&request).unwrap_or_else(|_| "{}".to_string())
    }

    /// Build both system and user prompts.
    pub fn build(&self) -> (String, String) {
        (self.build_system_prompt(), self.build_user_prompt())
    }
}

/// Translation request structure for JSON communication with the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Task identifier
    pub task: String,
    /// Source language name
    pub source_language: String,
    /// Target language name
    pub target_language: String,
    /// Number of entries expected back
    pub segment_count: usize,
    /// Texts to translate, in order
    pub segments: Vec<String>,
}

/// Expected JSON answer from the translator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    /// Translations, one per input segment
    pub translations: Vec<String>,
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Build the scoring prompt for one segment.
///
/// Both texts are cut to `max_chars` characters. Braces in the content are
/// passed through untouched.
pub fn build_scoring_prompt(original: &str, translated: &str, target_language: &str, max_chars: usize) -> String {
    let target_name = get_language_name(target_language).unwrap_or_else(|_| target_language.to_string());
    let original = truncate_chars(original, max_chars);
    let translated = truncate_chars(translated, max_chars);

    format!(
        "Score this translation from English to {target}.\n\n\
         Original English:\n{original}\n\n\
         Translation:\n{translated}\n\n\
         Evaluate on:\n\
         - Fluency: Does it read naturally in {target}? (1-5)\n\
         - Accuracy: Is the meaning preserved? (1-5)\n\
         - Overall: Combined quality score (1-5)\n\n\
         Flag any issues (awkward phrasing, mistranslated terms, changed meaning, etc.)\n\n\
         Respond with ONLY valid JSON, no other text:\n\
         {{\"overall\": <number>, \"fluency\": <number>, \"accuracy\": <number>, \"flags\": [<strings>]}}",
        target = target_name,
        original = original,
        translated = translated,
    )
}
