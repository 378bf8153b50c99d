//! Russian morphology on top of the Snowball stemmer / 基于 Snowball 的俄语形态分析
//!
//! The stem stands in for the dictionary lemma: all inflected forms of a word
//! share it, which is what indexing and querying need. Closed-class words are
//! tagged from a fixed table so the lemmatizer can drop them.

use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

use super::{Morphology, CONJUNCTION, INTERJECTION, PREPOSITION};

/// Content word tag / 实词标记
pub const CONTENT_WORD: &str = "ЗНАМ";

const CONJUNCTIONS: &[&str] = &[
    "и", "а", "но", "да", "или", "либо", "ни", "что", "чтобы", "чтоб", "если", "когда", "как",
    "будто", "словно", "хотя", "хоть", "пока", "зато", "однако", "тоже", "также", "причем",
    "причём", "потому", "поэтому", "ибо", "раз", "коли", "нежели", "лишь", "едва",
];

const PREPOSITIONS: &[&str] = &[
    "в", "во", "на", "с", "со", "к", "ко", "по", "о", "об", "обо", "от", "ото", "до", "из", "изо",
    "у", "за", "над", "надо", "под", "подо", "при", "про", "для", "без", "безо", "через", "перед",
    "передо", "между", "меж", "около", "вокруг", "после", "среди", "возле", "ради", "сквозь",
    "вдоль", "мимо", "против", "кроме", "вместо", "внутри", "сверх", "близ", "вслед",
];

const INTERJECTIONS: &[&str] = &[
    "ах", "ох", "эх", "ой", "ай", "ух", "увы", "ура", "эй", "ого", "ага", "фу", "тьфу", "ау",
    "браво", "алло", "ахти", "батюшки", "ишь", "цыц", "брр",
];

/// Closed-class word -> tag / 虚词表
static FUNCTION_WORDS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut words = HashMap::new();
    // 同形词只保留一个标记即可，任何一个都会被过滤
    for word in INTERJECTIONS {
        words.insert(*word, INTERJECTION);
    }
    for word in PREPOSITIONS {
        words.insert(*word, PREPOSITION);
    }
    for word in CONJUNCTIONS {
        words.insert(*word, CONJUNCTION);
    }
    words
});

/// Default morphology for Russian text / 默认俄语形态分析器
pub struct SnowballMorphology {
    stemmer: Stemmer,
}

impl SnowballMorphology {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::Russian),
        }
    }

    fn stem(&self, word: &str) -> String {
        // ё 与 е 视为同一字母
        let word = word.replace('ё', "е");
        self.stemmer.stem(&word).into_owned()
    }
}

impl Default for SnowballMorphology {
    fn default() -> Self {
        Self::new()
    }
}

impl Morphology for SnowballMorphology {
    fn normal_forms(&self, word: &str) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }
        if FUNCTION_WORDS.contains_key(word) {
            return vec![word.to_string()];
        }
        vec![self.stem(word)]
    }

    fn morph_info(&self, word: &str) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }
        let tag = FUNCTION_WORDS.get(word).copied().unwrap_or(CONTENT_WORD);
        vec![format!("{}|{}", word, tag)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::is_function_word;

    #[test]
    fn test_inflected_forms_share_normal_form() {
        let morphology = SnowballMorphology::new();
        assert_eq!(morphology.normal_forms("собака"), morphology.normal_forms("собаки"));
        assert_eq!(morphology.normal_forms("собака"), morphology.normal_forms("собаку"));
        assert_eq!(morphology.normal_forms("кот"), morphology.normal_forms("кота"));
        assert_ne!(morphology.normal_forms("кот"), morphology.normal_forms("собака"));
    }

    #[test]
    fn test_yo_is_folded() {
        let morphology = SnowballMorphology::new();
        assert_eq!(morphology.normal_forms("ёжик"), morphology.normal_forms("ежик"));
    }

    #[test]
    fn test_function_words_are_tagged() {
        let morphology = SnowballMorphology::new();
        for word in ["и", "в", "для", "ой", "чтобы"] {
            assert!(is_function_word(&morphology.morph_info(word)), "{}", word);
        }
        assert!(!is_function_word(&morphology.morph_info("собака")));
        assert_eq!(morphology.morph_info("собака"), vec!["собака|ЗНАМ".to_string()]);
    }

    #[test]
    fn test_empty_word_has_no_interpretation() {
        let morphology = SnowballMorphology::new();
        assert!(morphology.normal_forms("").is_empty());
        assert!(morphology.morph_info("").is_empty());
    }
}
