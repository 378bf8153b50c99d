//! Lemmatizer - text to lemma frequency map / 词元化器
//!
//! Pipeline (same for page content and queries) / 处理流程（页面与查询共用）：
//! 1. Remove markup (script/style blocks, tags, entities) / 去除标记
//! 2. Lowercase, everything outside а-я/ё becomes a separator / 小写化并切分
//! 3. Drop function words (conjunctions, prepositions, interjections) / 过滤虚词
//! 4. Count the first normal form of every remaining token / 统计首个原形

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::morphology::{is_function_word, Morphology};

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>")
        .expect("valid script/style regex")
});
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid entity regex"));

/// Remove markup and decode entities, tags become spaces / 去除HTML标记
pub fn strip_markup(html: &str) -> String {
    let text = SCRIPT_STYLE.replace_all(html, " ");
    let text = COMMENT.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    decode_entities(&text)
}

/// Decode numeric and common named entities / 解码HTML实体
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "nbsp" => ' ',
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "laquo" => '«',
        "raquo" => '»',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "copy" => '©',
        _ => return None,
    };
    Some(c)
}

fn is_working_letter(c: char) -> bool {
    matches!(c, 'а'..='я' | 'ё')
}

/// Split text into lowercase words of the working alphabet / 按工作字母表切分单词
pub fn words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !is_working_letter(c))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text normalizer shared by indexing and querying / 索引与查询共用的词元化器
#[derive(Clone)]
pub struct Lemmatizer {
    morphology: Arc<dyn Morphology>,
}

impl Lemmatizer {
    pub fn new(morphology: Arc<dyn Morphology>) -> Self {
        Self { morphology }
    }

    /// Lemma -> occurrence count / 词元 -> 出现次数
    pub fn lemmatize(&self, text: &str) -> BTreeMap<String, u32> {
        let mut lemmas = BTreeMap::new();
        if text.trim().is_empty() {
            tracing::debug!("Lemmatizer got empty text");
            return lemmas;
        }

        let plain = strip_markup(text);
        for word in words(&plain) {
            if let Some(lemma) = self.lemma_of(&word) {
                *lemmas.entry(lemma).or_insert(0) += 1;
            }
        }
        lemmas
    }

    /// Distinct lemmas of the text / 文本的不重复词元集合
    pub fn lemma_set(&self, text: &str) -> BTreeSet<String> {
        self.lemmatize(text).into_keys().collect()
    }

    /// First normal form of a content word, None for function words and unknown words / 单词的词元
    pub fn lemma_of(&self, word: &str) -> Option<String> {
        if is_function_word(&self.morphology.morph_info(word)) {
            return None;
        }
        self.morphology.normal_forms(word).into_iter().next()
    }
}
