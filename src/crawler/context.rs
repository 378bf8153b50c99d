//! Run-scoped crawl state / 单次索引运行的共享状态
//!
//! One `RunContext` per indexing run, handed to every crawl task:
//! - cancellation signal (stop request) / 取消信号
//! - visited-link registry / 已访问链接
//! - active site and its worker pool / 当前站点及其工作池
//! - result counters / 统计计数

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::models::Site;

/// Counter snapshot / 计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub pages_saved: u64,
    pub pages_failed: u64,
    /// Path already stored by another task / 路径已保存，跳过
    pub pages_skipped: u64,
    pub links_visited: u64,
}

/// How one fetched page ended up / 单个页面的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRecord {
    /// Stored with an indexable status / 已保存并索引
    Indexed,
    /// Stored with an error status or no response / 已保存但出错
    Failed,
    Skipped,
}

struct ActiveSite {
    site_id: i64,
    pool: Arc<Semaphore>,
}

pub struct RunContext {
    cancel: CancellationToken,
    finished: AtomicBool,
    visited: Mutex<HashSet<String>>,
    active: Mutex<Option<ActiveSite>>,
    pages_saved: AtomicU64,
    pages_failed: AtomicU64,
    pages_skipped: AtomicU64,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            finished: AtomicBool::new(false),
            visited: Mutex::new(HashSet::new()),
            active: Mutex::new(None),
            pages_saved: AtomicU64::new(0),
            pages_failed: AtomicU64::new(0),
            pages_skipped: AtomicU64::new(0),
        }
    }

    /// False once a stop was requested / 是否仍允许抓取
    pub fn is_enabled(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Enabled and not finished yet / 运行中
    pub fn is_running(&self) -> bool {
        self.is_enabled() && !self.finished.load(Ordering::SeqCst)
    }

    /// Resolves when a stop is requested / 等待取消
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Mark the run finished (all sites done or stopped) / 标记运行结束
    pub fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Cancel the run and close the active pool, returns the active site id / 停止运行
    ///
    /// Closing the pool makes every task still waiting for a permit return
    /// without fetching.
    pub fn stop(&self) -> Option<i64> {
        self.cancel.cancel();
        self.active.lock().as_ref().map(|active| {
            active.pool.close();
            active.site_id
        })
    }

    /// Claim a link for fetching, false when it was already claimed / 原子地检查并登记链接
    pub fn try_visit(&self, link: &str) -> bool {
        self.visited.lock().insert(normalize_link(link))
    }

    /// Install the pool of the site being crawled / 设置当前站点
    pub fn activate(&self, site_id: i64, pool: Arc<Semaphore>) {
        let mut active = self.active.lock();
        if self.cancel.is_cancelled() {
            pool.close();
        }
        *active = Some(ActiveSite { site_id, pool });
    }

    pub fn deactivate(&self, site_id: i64) {
        let mut active = self.active.lock();
        if active.as_ref().map_or(false, |a| a.site_id == site_id) {
            *active = None;
        }
    }

    pub fn active_site_id(&self) -> Option<i64> {
        self.active.lock().as_ref().map(|active| active.site_id)
    }

    pub fn record_page(&self, record: PageRecord) {
        let counter = match record {
            PageRecord::Indexed => &self.pages_saved,
            PageRecord::Failed => &self.pages_failed,
            PageRecord::Skipped => &self.pages_skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            pages_saved: self.pages_saved.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            pages_skipped: self.pages_skipped.load(Ordering::Relaxed),
            links_visited: self.visited.lock().len() as u64,
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry key of a link / 链接登记键
fn normalize_link(link: &str) -> String {
    let link = link.trim();
    match Url::parse(link) {
        Ok(url) => url.to_string(),
        Err(_) => link.to_string(),
    }
}

/// Per-site state shared by the tasks of one site traversal / 单个站点遍历的共享状态
pub struct SiteCrawl {
    pub run: Arc<RunContext>,
    pub site: Site,
    pub pool: Arc<Semaphore>,
    /// Links must start with this prefix / 站点前缀
    pub prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_visit_is_idempotent() {
        let run = RunContext::new();
        assert!(run.try_visit("https://example.com/news"));
        assert!(!run.try_visit("https://example.com/news"));
        // 主机名大小写归一
        assert!(!run.try_visit("https://EXAMPLE.com/news"));
        assert!(run.try_visit("https://example.com/news/"));
        assert_eq!(run.stats().links_visited, 2);
    }

    #[test]
    fn test_page_records_are_counted_apart() {
        let run = RunContext::new();
        run.record_page(PageRecord::Indexed);
        run.record_page(PageRecord::Indexed);
        run.record_page(PageRecord::Failed);
        run.record_page(PageRecord::Skipped);

        let stats = run.stats();
        assert_eq!(stats.pages_saved, 2);
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.pages_skipped, 1);
    }

    #[test]
    fn test_stop_closes_active_pool() {
        let run = RunContext::new();
        let pool = Arc::new(Semaphore::new(2));
        run.activate(7, pool.clone());
        assert!(run.is_running());

        assert_eq!(run.stop(), Some(7));
        assert!(!run.is_enabled());
        assert!(!run.is_running());
        assert!(pool.is_closed());
    }

    #[test]
    fn test_activate_after_stop_closes_pool() {
        let run = RunContext::new();
        assert_eq!(run.stop(), None);

        let pool = Arc::new(Semaphore::new(1));
        run.activate(1, pool.clone());
        assert!(pool.is_closed());
        run.deactivate(1);
        assert_eq!(run.active_site_id(), None);
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_stop() {
        let run = Arc::new(RunContext::new());
        let waiter = {
            let run = run.clone();
            tokio::spawn(async move { run.cancelled().await })
        };
        run.stop();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
