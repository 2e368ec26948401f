/*!
 * Prompt content for the LLM backends.
 *
 * This module provides:
 * - The translator system prompt and per-language style guides
 * - JSON request/response shapes exchanged with the translator
 * - The quality scoring prompt
 *
 * Everything here is a pure function of its inputs so prompts can be
 * asserted on in tests.
 */

pub mod templates;

// Re-export main types
pub use templates::{
    GENERIC_FORMAT_RULES, PromptTemplate, SPANISH_STYLE_RULES, TranslationPromptBuilder,
    TranslationResponse, build_scoring_prompt, style_rules_for,
};
