/*!
 * Glossary application.
 *
 * Organisation glossaries map source terms to mandated target terms. Terms
 * are substituted into segment text before translation, longest term first,
 * matching whole words without regard to case.
 */

use log::{debug, warn};
use regex::{NoExpand, Regex, RegexBuilder};
use std::collections::HashMap;

use crate::translation::segmenter::Segment;

/// Compiled glossary for one job
#[derive(Debug, Clone, Default)]
pub struct GlossaryApplier {
    /// Patterns in application order with their replacements
    patterns: Vec<(Regex, String)>,
}

impl GlossaryApplier {
    /// Compile a term mapping. Terms that are blank are ignored.
    pub fn new(terms: &HashMap<String, String>) -> Self {
        let mut ordered: Vec<(&String, &String)> = terms
            .iter()
            .filter(|(source, _)| !source.trim().is_empty())
            .collect();
        ordered.sort_by(|(a, _), (b, _)| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });

        let mut patterns = Vec::with_capacity(ordered.len());
        for (source, target) in ordered {
            let pattern = format!(r"\b{}\b", regex::escape(source));
            match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                Ok(regex) => patterns.push((regex, target.clone())),
                Err(e) => warn!("Skipping glossary term '{}': {}", source, e),
            }
        }

        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Substitute every term in `text`
    pub fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (regex, replacement) in &self.patterns {
            result = regex.replace_all(&result, NoExpand(replacement.as_str())).into_owned();
        }
        result
    }

    /// Rewrite the text of every segment in place
    pub fn apply_to_segments(&self, segments: &mut [Segment]) {
        if self.is_empty() {
            return;
        }
        let mut changed = 0;
        for segment in segments.iter_mut() {
            let updated = self.apply(&segment.text);
            if updated != segment.text {
                segment.text = updated;
                changed += 1;
            }
        }
        debug!("Glossary of {} terms changed {} of {} segments", self.len(), changed, segments.len());
    }
}

/// Apply a term mapping to a single text
pub fn apply_glossary(text: &str, terms: &HashMap<String, String>) -> String {
    if terms.is_empty() {
        return text.to_string();
    }
    GlossaryApplier::new(terms).apply(text)
}

/// Whitespace-delimited word count over all segment texts
pub fn count_words(segments: &[Segment]) -> usize {
    segments.iter().map(|s| s.text.split_whitespace().count()).sum()
}
