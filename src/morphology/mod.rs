//! Morphology module - word normal forms and grammatical tags / 形态分析模块
//!
//! Implementations / 实现：
//! - SnowballMorphology: Russian Snowball stemmer + closed-class word table (default) / 默认
//! - DictionaryMorphology: word-form dictionary file, optional fallback / 词形词典

pub mod dictionary;
pub mod russian;

pub use dictionary::DictionaryMorphology;
pub use russian::SnowballMorphology;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Conjunction tag / 连词
pub const CONJUNCTION: &str = "СОЮЗ";
/// Preposition tag / 介词
pub const PREPOSITION: &str = "ПРЕДЛ";
/// Interjection tag / 感叹词
pub const INTERJECTION: &str = "МЕЖД";

/// Tags marking function words that are never indexed / 不参与索引的虚词标记
pub const FUNCTION_WORD_MARKERS: [&str; 3] = [INTERJECTION, PREPOSITION, CONJUNCTION];

/// Morphological analyzer / 形态分析器
///
/// Both methods take a lowercase token of the working alphabet.
pub trait Morphology: Send + Sync {
    /// Normal forms, most likely first. Empty when the word has no interpretation / 词的原形
    fn normal_forms(&self, word: &str) -> Vec<String>;

    /// One `form|TAGS` entry per interpretation / 每种解析的语法信息
    fn morph_info(&self, word: &str) -> Vec<String>;
}

/// Whether any interpretation carries a function-word tag / 是否为虚词
pub fn is_function_word(infos: &[String]) -> bool {
    infos.iter().any(|info| {
        let tags = info.split_once('|').map(|(_, tags)| tags).unwrap_or(info);
        tags.split(|c: char| c == ' ' || c == ',')
            .any(|tag| FUNCTION_WORD_MARKERS.contains(&tag))
    })
}

/// Build the configured morphology: dictionary with Snowball fallback, or Snowball alone / 创建形态分析器
pub fn build_morphology(dictionary: Option<&Path>) -> Result<Arc<dyn Morphology>> {
    let snowball: Arc<dyn Morphology> = Arc::new(SnowballMorphology::new());
    match dictionary {
        Some(path) => {
            let dictionary = DictionaryMorphology::load(path)?.with_fallback(snowball);
            tracing::info!("Morphology dictionary loaded: {:?} ({} forms)", path, dictionary.len());
            Ok(Arc::new(dictionary))
        }
        None => Ok(snowball),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_function_word() {
        assert!(is_function_word(&["и|СОЮЗ".to_string()]));
        assert!(is_function_word(&["в|ПРЕДЛ".to_string()]));
        assert!(is_function_word(&["ой|МЕЖД".to_string()]));
        assert!(is_function_word(&["как|Н".to_string(), "как|СОЮЗ".to_string()]));
        assert!(!is_function_word(&["кот|С мр,ед,им".to_string()]));
        assert!(!is_function_word(&[]));
    }

    #[test]
    fn test_build_without_dictionary_is_snowball() {
        let morphology = build_morphology(None).unwrap();
        assert_eq!(morphology.normal_forms("кошки"), morphology.normal_forms("кошка"));
        assert!(is_function_word(&morphology.morph_info("и")));
    }
}
