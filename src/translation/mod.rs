/*!
 * Content translation stages.
 *
 * This module contains the per-job content processing used by the pipeline.
 * It is split into several submodules:
 *
 * - `segmenter`: HTML segmentation and reassembly
 * - `glossary`: Organisation glossary substitution
 * - `prompts`: Prompt templates for the LLM backends
 * - `orchestrator`: Batched translation with backend routing and fallback
 * - `quality`: Automated quality scoring
 */

// Re-export main types for easier usage
pub use self::glossary::{GlossaryApplier, apply_glossary, count_words};
pub use self::orchestrator::{TranslationSummary, Translator};
pub use self::quality::{QualityScore, QualityScorer, SegmentScore};
pub use self::segmenter::{Segment, reassemble_html, segment_html};

// Submodules
pub mod glossary;
pub mod orchestrator;
pub mod prompts;
pub mod quality;
pub mod segmenter;
