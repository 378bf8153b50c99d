//! Word-form dictionary morphology / 词形词典形态分析
//!
//! File format, one interpretation per line / 文件格式（每行一种解析）：
//! `form<TAB>lemma<TAB>tags`, `#` starts a comment line.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::Morphology;
use crate::error::{Result, SearchError};

#[derive(Debug, Clone)]
struct Interpretation {
    lemma: String,
    tags: String,
}

/// Dictionary-backed morphology / 基于词典的形态分析器
pub struct DictionaryMorphology {
    forms: HashMap<String, Vec<Interpretation>>,
    fallback: Option<Arc<dyn Morphology>>,
}

impl DictionaryMorphology {
    /// Build from `(form, lemma, tags)` triples / 从三元组构建
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: AsRef<str>,
    {
        let mut forms: HashMap<String, Vec<Interpretation>> = HashMap::new();
        for (form, lemma, tags) in entries {
            forms
                .entry(form.as_ref().to_lowercase())
                .or_default()
                .push(Interpretation {
                    lemma: lemma.as_ref().to_lowercase(),
                    tags: tags.as_ref().to_string(),
                });
        }
        Self { forms, fallback: None }
    }

    /// Parse dictionary text / 解析词典文本
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split('\t');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(form), Some(lemma), Some(tags)) if !form.is_empty() && !lemma.is_empty() => {
                    entries.push((form.to_string(), lemma.to_string(), tags.to_string()));
                }
                _ => {
                    return Err(SearchError::Config(format!(
                        "morphology dictionary line {}: expected form, lemma and tags",
                        line_no + 1
                    )));
                }
            }
        }
        Ok(Self::from_entries(entries))
    }

    /// Load dictionary file / 加载词典文件
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Ask `fallback` for words missing from the dictionary / 设置未登录词的备用分析器
    pub fn with_fallback(mut self, fallback: Arc<dyn Morphology>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Number of distinct word forms / 词形数量
    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

impl Morphology for DictionaryMorphology {
    fn normal_forms(&self, word: &str) -> Vec<String> {
        match self.forms.get(word) {
            Some(interpretations) => {
                let mut lemmas: Vec<String> = Vec::with_capacity(interpretations.len());
                for interpretation in interpretations {
                    if !lemmas.contains(&interpretation.lemma) {
                        lemmas.push(interpretation.lemma.clone());
                    }
                }
                lemmas
            }
            None => self
                .fallback
                .as_ref()
                .map(|fallback| fallback.normal_forms(word))
                .unwrap_or_default(),
        }
    }

    fn morph_info(&self, word: &str) -> Vec<String> {
        match self.forms.get(word) {
            Some(interpretations) => interpretations
                .iter()
                .map(|interpretation| format!("{}|{}", interpretation.lemma, interpretation.tags))
                .collect(),
            None => self
                .fallback
                .as_ref()
                .map(|fallback| fallback.morph_info(word))
                .unwrap_or_default(),
        }
    }
}
