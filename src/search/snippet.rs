//! Snippet selector - the tightest window of page words covering every query lemma

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;

use super::lemma::{strip_tags, LemmaExtractor};

/// Words without any of these characters are dropped from the rendered snippet
static SNIPPET_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-().,А-яЁё]").unwrap());

/// Text of the first `<title>` element, trimmed; empty if there is none
pub fn page_title(html: &str) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct SnippetSelector {
    extractor: LemmaExtractor,
    context_words: usize,
}

impl SnippetSelector {
    pub fn new(extractor: LemmaExtractor, context_words: usize) -> Self {
        Self {
            extractor,
            context_words,
        }
    }

    /// Render the snippet of `content` for the given query lemmas.
    /// Empty when some lemma never occurs in the page.
    pub fn snippet(&self, content: &str, query_lemmas: &[String]) -> String {
        let plain = strip_tags(content);
        let words: Vec<&str> = plain.split_whitespace().collect();
        let positions = self.lemma_positions(&words);

        match select_window(&positions, query_lemmas) {
            Some(chosen) => self.render(&words, &chosen),
            None => String::new(),
        }
    }

    /// Lemma → indexes of the words it occurs in
    fn lemma_positions(&self, words: &[&str]) -> HashMap<String, Vec<usize>> {
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, word) in words.iter().enumerate() {
            for lemma in self.extractor.word_lemmas(word) {
                positions.entry(lemma).or_default().push(i);
            }
        }
        positions
    }

    fn render(&self, words: &[&str], chosen: &[usize]) -> String {
        let (Some(&lo), Some(&hi)) = (chosen.iter().min(), chosen.iter().max()) else {
            return String::new();
        };
        let start = lo.saturating_sub(self.context_words);
        let end = (hi + self.context_words).min(words.len().saturating_sub(1));

        let mut parts = Vec::with_capacity(end + 1 - start);
        for (i, word) in words.iter().enumerate().take(end + 1).skip(start) {
            if chosen.contains(&i) {
                parts.push(format!("<b>{}</b>", word));
            } else if SNIPPET_WORD_RE.is_match(word) {
                parts.push(word.to_string());
            }
        }
        parts.join(" ")
    }
}

/// Word indexes of the minimal-span cover, or `None` if some query lemma is missing.
///
/// `query_lemmas` come rarest first, so the first lemma's occurrences are the
/// anchors; each other lemma contributes its occurrence closest to the anchor
/// (ties go to the smaller index). The first anchor reaching the smallest span wins.
pub fn select_window(positions: &HashMap<String, Vec<usize>>, query_lemmas: &[String]) -> Option<Vec<usize>> {
    let mut lists = Vec::with_capacity(query_lemmas.len());
    for lemma in query_lemmas {
        lists.push(positions.get(lemma).filter(|p| !p.is_empty())?);
    }
    let (anchors, others) = lists.split_first()?;

    let mut best: Option<(usize, Vec<usize>)> = None;
    for &anchor in anchors.iter() {
        let mut chosen = vec![anchor];
        for list in others {
            let closest = list
                .iter()
                .copied()
                .fold(None::<usize>, |acc, pos| match acc {
                    Some(cur) if cur.abs_diff(anchor) <= pos.abs_diff(anchor) => Some(cur),
                    _ => Some(pos),
                })?;
            chosen.push(closest);
        }

        let span = chosen.iter().max()? - chosen.iter().min()?;
        if best.as_ref().map_or(true, |(best_span, _)| span < *best_span) {
            best = Some((span, chosen));
        }
    }
    best.map(|(_, chosen)| chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::testing::DictionaryMorphology;
    use std::sync::Arc;

    fn selector() -> SnippetSelector {
        let morph = DictionaryMorphology::new()
            .word("кота", &["кот"])
            .word("коты", &["кот"])
            .word("собаки", &["собака"]);
        SnippetSelector::new(LemmaExtractor::new(Arc::new(morph)), 5)
    }

    fn lemmas(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_page_title() {
        assert_eq!(page_title("<html><head><title> Кошки </title></head></html>"), "Кошки");
        assert_eq!(page_title("<p>no title</p>"), "");
    }

    #[test]
    fn test_select_window_prefers_tightest_cluster() {
        let mut positions = HashMap::new();
        positions.insert("кот".to_string(), vec![0, 10, 20]);
        positions.insert("собака".to_string(), vec![18]);
        assert_eq!(select_window(&positions, &lemmas(&["собака", "кот"])), Some(vec![18, 20]));
    }

    #[test]
    fn test_select_window_anchors_on_first_lemma() {
        let mut positions = HashMap::new();
        positions.insert("кот".to_string(), vec![0, 10, 20]);
        positions.insert("собака".to_string(), vec![18]);
        assert_eq!(select_window(&positions, &lemmas(&["кот", "собака"])), Some(vec![20, 18]));
    }

    #[test]
    fn test_select_window_tie_goes_to_smaller_index() {
        let mut positions = HashMap::new();
        positions.insert("кот".to_string(), vec![3, 7]);
        positions.insert("собака".to_string(), vec![5]);
        assert_eq!(select_window(&positions, &lemmas(&["собака", "кот"])), Some(vec![5, 3]));
    }

    #[test]
    fn test_select_window_missing_lemma() {
        let mut positions = HashMap::new();
        positions.insert("кот".to_string(), vec![1]);
        assert_eq!(select_window(&positions, &lemmas(&["кот", "собака"])), None);
    }

    #[test]
    fn test_snippet_bold_and_context() {
        let text = "<p>раз два три четыре пять шесть семь кота восемь девять десять одиннадцать двенадцать тринадцать</p>";
        let snippet = selector().snippet(text, &lemmas(&["кот"]));
        assert_eq!(
            snippet,
            "три четыре пять шесть семь <b>кота</b> восемь девять десять одиннадцать двенадцать"
        );
    }

    #[test]
    fn test_snippet_clips_and_drops_noise() {
        let text = "Коты 123 и собаки, !!! дом";
        let snippet = selector().snippet(text, &lemmas(&["собака", "кот"]));
        assert_eq!(snippet, "<b>Коты</b> и <b>собаки,</b> дом");
    }

    #[test]
    fn test_snippet_empty_without_match() {
        assert_eq!(selector().snippet("<p>только кот</p>", &lemmas(&["собака"])), "");
        assert_eq!(selector().snippet("", &lemmas(&["кот"])), "");
    }
}
