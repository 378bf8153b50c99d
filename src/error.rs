//! Error types / 错误类型

use thiserror::Error;

/// Library error / 库错误
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Empty search query / 空搜索请求
    #[error("empty search query")]
    EmptyQuery,

    /// URL is not under any configured site / 链接不属于配置的站点
    #[error("page is outside the configured sites: {0}")]
    OutsideConfiguredSites(String),

    #[error("indexing is already running")]
    AlreadyIndexing,

    #[error("configuration error: {0}")]
    Config(String),

    /// Crawl task failure (panic or join error) / 爬取任务失败
    #[error("task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
