//! Snippet builder / 摘要生成
//!
//! The page text is split into sentences on `.`, `!` and `?`. Each highlight
//! term picks the first sentence containing it (case-insensitive). A sentence
//! picked by several terms appears once, and every term inside it is wrapped
//! in `<b>`. Fragments are each followed by `...`.

use regex::Regex;
use std::collections::BTreeSet;

use super::lemmatizer::{words, Lemmatizer};

/// Emphasis markup / 高亮标记
pub const EMPHASIS_OPEN: &str = "<b>";
pub const EMPHASIS_CLOSE: &str = "</b>";
/// Fragment separator / 片段分隔符
pub const ELLIPSIS: &str = "...";

/// Words to highlight for a query / 需要高亮的词
///
/// Content words of the query first, then every word form of the page that
/// shares a lemma with the query, in order of first appearance.
pub fn highlight_terms(lemmatizer: &Lemmatizer, query: &str, page_text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut query_lemmas = BTreeSet::new();

    for word in words(query) {
        if let Some(lemma) = lemmatizer.lemma_of(&word) {
            query_lemmas.insert(lemma);
            if !terms.contains(&word) {
                terms.push(word);
            }
        }
    }
    if query_lemmas.is_empty() {
        return terms;
    }

    let mut seen = BTreeSet::new();
    for word in words(page_text) {
        if terms.contains(&word) || !seen.insert(word.clone()) {
            continue;
        }
        if let Some(lemma) = lemmatizer.lemma_of(&word) {
            if query_lemmas.contains(&lemma) {
                terms.push(word);
            }
        }
    }
    terms
}

/// Build the highlighted snippet of `text` / 生成高亮摘要
pub fn build_snippet(text: &str, terms: &[String]) -> String {
    let terms: Vec<&str> = terms.iter().map(|t| t.as_str()).filter(|t| !t.is_empty()).collect();
    if terms.is_empty() {
        return String::new();
    }

    let sentences: Vec<&str> = text
        .split(|c| c == '.' || c == '!' || c == '?')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let lowered: Vec<String> = sentences.iter().map(|s| s.to_lowercase()).collect();

    // 每个词选取第一个包含它的句子，同一句只出现一次
    let mut picked: Vec<usize> = Vec::new();
    for term in &terms {
        let term = term.to_lowercase();
        if let Some(index) = lowered.iter().position(|s| s.contains(&term)) {
            if !picked.contains(&index) {
                picked.push(index);
            }
        }
    }
    if picked.is_empty() {
        return String::new();
    }

    let Some(pattern) = emphasis_pattern(&terms) else {
        return String::new();
    };

    let mut snippet = String::new();
    for index in picked {
        let fragment = pattern.replace_all(sentences[index], |caps: &regex::Captures| {
            format!("{}{}{}", EMPHASIS_OPEN, &caps[0], EMPHASIS_CLOSE)
        });
        snippet.push_str(&fragment);
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

/// One case-insensitive alternation, longest term first so nested forms never double-wrap
fn emphasis_pattern(terms: &[&str]) -> Option<Regex> {
    let mut sorted: Vec<&str> = terms.to_vec();
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
    sorted.dedup();
    let alternation = sorted.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    match Regex::new(&format!("(?i){}", alternation)) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!("Failed to build snippet pattern: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::SnowballMorphology;
    use std::sync::Arc;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_matching_sentence_per_term() {
        let text = "Кот спит. Собака лает! Кот ест? Никто не знает.";
        assert_eq!(
            build_snippet(text, &terms(&["кот", "собака"])),
            "<b>Кот</b> спит...<b>Собака</b> лает..."
        );
    }

    #[test]
    fn test_shared_sentence_appears_once_with_all_terms() {
        let text = "Утро. Кот и собака дружат. Вечер.";
        assert_eq!(
            build_snippet(text, &terms(&["кот", "собака"])),
            "<b>Кот</b> и <b>собака</b> дружат..."
        );
    }

    #[test]
    fn test_non_matching_term_contributes_nothing() {
        let text = "Кот спит.";
        assert_eq!(build_snippet(text, &terms(&["слон"])), "");
        assert_eq!(build_snippet(text, &terms(&["слон", "кот"])), "<b>Кот</b> спит...");
        assert_eq!(build_snippet(text, &[]), "");
    }

    #[test]
    fn test_nested_forms_are_wrapped_once() {
        let text = "Мы видели кота.";
        assert_eq!(
            build_snippet(text, &terms(&["кот", "кота"])),
            "Мы видели <b>кота</b>..."
        );
    }

    #[test]
    fn test_highlight_terms_include_page_word_forms() {
        let lemmatizer = Lemmatizer::new(Arc::new(SnowballMorphology::new()));
        let found = highlight_terms(&lemmatizer, "собака и кот", "Две собаки и кот. Собака спит.");
        assert_eq!(found, terms(&["собака", "кот", "собаки"]));
    }
}
