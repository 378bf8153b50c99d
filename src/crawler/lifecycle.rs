//! Site lifecycle - status state machine of a site / 站点状态管理
//!
//! INDEXING → INDEXED (normal completion) / 正常完成
//! INDEXING → FAILED  (stop request or fatal traversal error) / 停止或致命错误
//!
//! Transitions are compare-and-set on the stored status, so a site already
//! marked FAILED by a stop request stays FAILED.

use std::sync::Arc;

use crate::config::SiteConfig;
use crate::error::Result;
use crate::models::{Site, SiteStatus};
use crate::storage::SearchStore;

/// lastError of a site stopped by the user / 用户停止时的错误信息
pub const STOPPED_BY_USER: &str = "stopped by user";

/// Error text recorded on the site for a page status, None for 200 / 状态码对应的错误信息
pub fn status_error_text(code: u16) -> Option<&'static str> {
    match code {
        200 => None,
        301 => Some("moved"),
        302 => Some("temporarily unavailable"),
        400 => Some("bad request"),
        401 => Some("authentication required"),
        403 => Some("forbidden"),
        404 => Some("not found"),
        405 => Some("method not allowed"),
        500 => Some("server error"),
        _ => Some("unknown indexing error"),
    }
}

#[derive(Clone)]
pub struct SiteLifecycle {
    store: Arc<dyn SearchStore>,
}

impl SiteLifecycle {
    pub fn new(store: Arc<dyn SearchStore>) -> Self {
        Self { store }
    }

    /// Create the site row in INDEXING / 开始索引站点
    pub async fn begin(&self, config: &SiteConfig) -> Result<Site> {
        let mut site = Site::new(&config.url, &config.name, SiteStatus::Indexing);
        self.store.save_site(&mut site).await?;
        tracing::info!("Indexing site {} ({})", site.name, site.url);
        Ok(site)
    }

    /// INDEXING → INDEXED / 完成
    pub async fn complete(&self, site: &Site) -> Result<bool> {
        let moved = self
            .store
            .transition_site_status(site.id, SiteStatus::Indexing, SiteStatus::Indexed, None)
            .await?;
        if moved {
            tracing::info!("Site {} indexed", site.name);
        }
        Ok(moved)
    }

    /// INDEXING → FAILED with the error text / 失败
    pub async fn fail(&self, site: &Site, error: &str) -> Result<bool> {
        let moved = self
            .store
            .transition_site_status(site.id, SiteStatus::Indexing, SiteStatus::Failed, Some(error))
            .await?;
        if moved {
            tracing::error!("Site {} failed: {}", site.name, error);
        }
        Ok(moved)
    }

    /// INDEXING → FAILED "stopped by user" / 用户停止
    pub async fn stop(&self, site_id: i64) -> Result<bool> {
        let moved = self
            .store
            .transition_site_status(site_id, SiteStatus::Indexing, SiteStatus::Failed, Some(STOPPED_BY_USER))
            .await?;
        if moved {
            tracing::info!("Site {} stopped by user", site_id);
        }
        Ok(moved)
    }

    /// Record a page outcome on the site without changing its status / 记录页面结果
    pub async fn record_page_status(&self, site_id: i64, code: u16) -> Result<()> {
        match status_error_text(code) {
            Some(text) => self.store.set_site_error(site_id, text).await,
            None => self.store.touch_site(site_id).await,
        }
    }

    /// Record a fetch failure text on the site / 记录抓取错误
    pub async fn record_page_error(&self, site_id: i64, error: &str) -> Result<()> {
        self.store.set_site_error(site_id, error).await
    }
}
