//! Search module - text normalization, index maintenance and querying / 搜索模块
//!
//! Architecture principles / 架构原则：
//! - The same lemmatizer serves page content and queries / 页面与查询共用词元化器
//! - Index writes go through IndexBuilder only (per-site lock) / 索引写入统一经过 IndexBuilder
//! - Call direction: Core → Search → Store (unidirectional) / 调用方向

pub mod html;
pub mod index_builder;
pub mod lemmatizer;
pub mod query;
pub mod snippet;

pub use index_builder::IndexBuilder;
pub use lemmatizer::Lemmatizer;
pub use query::{QueryProcessor, SearchHit, SearchQuery, SearchResults};
