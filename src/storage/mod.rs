//! Storage module - durable sites, pages, lemmas and postings / 存储模块
//!
//! Architecture principles / 架构原则：
//! - The store only exposes primitive operations, crawl and ranking rules live in the core
//! - Call direction: Core → Store (unidirectional) / 调用方向
//! - Pages, lemmas and postings are cascade-deleted with their parents / 级联删除

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Lemma, Page, Posting, Site, SiteStatus};

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Search storage interface (provides only primitive operations) / 搜索存储接口
#[async_trait]
pub trait SearchStore: Send + Sync {
    // ---- sites / 站点 ----

    async fn site_exists_by_url(&self, url: &str) -> Result<bool>;

    async fn site_exists_by_status(&self, status: SiteStatus) -> Result<bool>;

    async fn find_site_by_url(&self, url: &str) -> Result<Option<Site>>;

    async fn find_site_by_id(&self, id: i64) -> Result<Option<Site>>;

    async fn list_sites(&self) -> Result<Vec<Site>>;

    /// Insert (id == 0) or update the site, assigns the id / 插入或更新站点
    async fn save_site(&self, site: &mut Site) -> Result<()>;

    /// Compare-and-set status change, returns whether the row moved / 条件状态迁移
    async fn transition_site_status(
        &self,
        site_id: i64,
        from: SiteStatus,
        to: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<bool>;

    /// Record a per-page error without touching the status / 记录错误，不改变状态
    async fn set_site_error(&self, site_id: i64, error: &str) -> Result<()>;

    /// Refresh status_time / 刷新状态时间
    async fn touch_site(&self, site_id: i64) -> Result<()>;

    async fn delete_site(&self, site_id: i64) -> Result<()>;

    // ---- pages / 页面 ----

    async fn page_exists(&self, site_id: i64, path: &str) -> Result<bool>;

    async fn find_page_by_path(&self, site_id: i64, path: &str) -> Result<Option<Page>>;

    async fn find_pages_by_site(&self, site_id: i64) -> Result<Vec<Page>>;

    async fn find_pages_by_ids(&self, ids: &[i64]) -> Result<Vec<Page>>;

    async fn count_pages(&self, site_id: i64) -> Result<i64>;

    /// Insert the page unless (site, path) already exists, returns whether it was inserted / 不存在时插入
    async fn save_page(&self, page: &mut Page) -> Result<bool>;

    /// Delete the page, its postings and its share of lemma frequencies / 删除页面（含索引与频率）
    async fn delete_page(&self, page_id: i64) -> Result<()>;

    // ---- lemmas / 词元 ----

    async fn find_lemma(&self, site_id: i64, lemma: &str) -> Result<Option<Lemma>>;

    /// All lemma rows with this text ordered by frequency asc, optionally one site only / 按频率升序
    async fn find_lemmas_by_text(&self, lemma: &str, site_id: Option<i64>) -> Result<Vec<Lemma>>;

    async fn count_lemmas(&self, site_id: i64) -> Result<i64>;

    /// Insert (id == 0) or update the lemma / 插入或更新词元
    async fn save_lemma(&self, lemma: &mut Lemma) -> Result<()>;

    // ---- postings / 倒排索引 ----

    async fn find_postings_by_lemmas(&self, lemma_ids: &[i64]) -> Result<Vec<Posting>>;

    async fn find_postings_by_page(&self, page_id: i64) -> Result<Vec<Posting>>;

    /// Upsert by (page, lemma) / 按 (页面, 词元) 插入或更新
    async fn save_posting(&self, posting: &mut Posting) -> Result<()>;

    /// Delete the page's postings and decrement the document frequency of their lemmas / 删除页面索引并回退频率
    async fn delete_page_postings(&self, page_id: i64) -> Result<u64>;

    // ---- reset / 重置 ----

    /// Wipe all four tables / 清空所有表
    async fn delete_all(&self) -> Result<()>;
}
