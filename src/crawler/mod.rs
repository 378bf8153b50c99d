//! Crawler module - site traversal and site status / 爬虫模块
//!
//! - links: which discovered links may be fetched / 链接过滤
//! - context: run-scoped state (cancel, visited, active pool) / 运行上下文
//! - fetch: GET + no-redirect status probe / HTTP 抓取
//! - lifecycle: INDEXING/INDEXED/FAILED transitions / 站点状态
//! - scheduler: fork/join traversal of one site / 遍历调度

pub mod context;
pub mod fetch;
pub mod lifecycle;
pub mod links;
pub mod scheduler;

pub use context::{PageRecord, RunContext, RunStats};
pub use fetch::{FetchedPage, HttpFetcher};
pub use lifecycle::{status_error_text, SiteLifecycle, STOPPED_BY_USER};
pub use links::is_valid_link;
pub use scheduler::{Crawler, PageOutcome};
