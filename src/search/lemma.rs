//! Lemma extractor - turns page or query text into a multiset of lemmas
//!
//! Pipeline: strip `<...>` spans → maximal Cyrillic runs → lowercase →
//! normal forms from the analyzer → drop function words → count.
//! Every normal form of a token is an independent lemma occurrence.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::morphology::{is_function_word, Morphology};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[а-яА-ЯёЁ]+").unwrap());

/// Lemma text → occurrence count
pub type LemmaCounts = HashMap<String, u32>;

/// Remove every `<...>` span, leaving a space so adjacent words do not merge
pub fn strip_tags(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    TAG_RE.replace_all(text, " ").into_owned()
}

/// Maximal Cyrillic runs of a text, lowercased
pub fn cyrillic_words(text: &str) -> impl Iterator<Item = String> + '_ {
    WORD_RE.find_iter(text).map(|m| m.as_str().to_lowercase())
}

#[derive(Clone)]
pub struct LemmaExtractor {
    morphology: Arc<dyn Morphology>,
}

impl LemmaExtractor {
    pub fn new(morphology: Arc<dyn Morphology>) -> Self {
        Self { morphology }
    }

    /// Count lemma occurrences in a (possibly HTML) text
    pub fn extract(&self, text: &str) -> LemmaCounts {
        let mut counts = LemmaCounts::new();
        let plain = strip_tags(text);
        if plain.trim().is_empty() {
            return counts;
        }

        for word in cyrillic_words(&plain) {
            let Some(forms) = self.token_lemmas(&word, true) else {
                continue;
            };
            for form in forms {
                *counts.entry(form).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Distinct lemmas of a text, in first-seen order
    pub fn distinct_lemmas(&self, text: &str) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for word in cyrillic_words(&strip_tags(text)) {
            if let Some(forms) = self.token_lemmas(&word, true) {
                for form in forms {
                    if !seen.contains(&form) {
                        seen.push(form);
                    }
                }
            }
        }
        seen
    }

    /// Lemmas of one whitespace-delimited word (no function-word filter, no counting)
    pub fn word_lemmas(&self, word: &str) -> Vec<String> {
        let mut lemmas = Vec::new();
        for token in cyrillic_words(word) {
            if let Some(forms) = self.token_lemmas(&token, false) {
                for form in forms {
                    if !lemmas.contains(&form) {
                        lemmas.push(form);
                    }
                }
            }
        }
        lemmas
    }

    /// Normal forms of one lowercase token; `None` if the token is skipped
    fn token_lemmas(&self, token: &str, filter_function_words: bool) -> Option<Vec<String>> {
        let forms = match self.morphology.normal_forms(token) {
            Ok(forms) => forms,
            Err(e) => {
                tracing::warn!("Skipping token '{}': {}", token, e);
                return None;
            }
        };
        if forms.is_empty() {
            return None;
        }

        if filter_function_words {
            for form in &forms {
                match self.morphology.grammatical_tags(form) {
                    Ok(tags) if is_function_word(&tags) => return None,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Skipping token '{}': {}", token, e);
                        return None;
                    }
                }
            }
        }
        Some(forms)
    }
}
