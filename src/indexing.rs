//! Indexing service - runs, stops and single-page re-indexing / 索引服务
//!
//! A run wipes storage, then crawls the configured sites one at a time in
//! configured order. Stopping cancels the run, closes the active pool and marks
//! the active site FAILED right away; in-flight tasks drain in the background.
//! A new run waits for the previous run's tasks before it wipes storage.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::{IndexingConfig, SiteConfig};
use crate::crawler::{Crawler, RunContext, SiteLifecycle};
use crate::error::{Result, SearchError};
use crate::models::{Site, SiteStatus};
use crate::search::{IndexBuilder, Lemmatizer};
use crate::storage::SearchStore;
use crate::utils::{is_under_prefix, site_relative_path};

#[derive(Default)]
struct RunSlot {
    run: Option<Arc<RunContext>>,
    handle: Option<JoinHandle<()>>,
}

pub struct IndexingService {
    sites: Vec<SiteConfig>,
    store: Arc<dyn SearchStore>,
    crawler: Arc<Crawler>,
    index_builder: Arc<IndexBuilder>,
    lifecycle: SiteLifecycle,
    slot: Mutex<RunSlot>,
}

impl IndexingService {
    pub fn new(config: &IndexingConfig, store: Arc<dyn SearchStore>, lemmatizer: Lemmatizer) -> Result<Self> {
        let index_builder = Arc::new(IndexBuilder::new(store.clone()));
        let lifecycle = SiteLifecycle::new(store.clone());
        let crawler = Crawler::new(
            config,
            store.clone(),
            lemmatizer,
            index_builder.clone(),
            lifecycle.clone(),
        )?;

        Ok(Self {
            sites: config.sites.clone(),
            store,
            crawler: Arc::new(crawler),
            index_builder,
            lifecycle,
            slot: Mutex::new(RunSlot::default()),
        })
    }

    /// Configured sites / 配置的站点
    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }

    /// Whether a run is active and not stopped / 是否正在索引
    pub fn is_indexing(&self) -> bool {
        self.slot.lock().run.as_ref().map_or(false, |run| run.is_running())
    }

    /// Start a full run in the background / 启动全量索引
    pub fn start_indexing(self: &Arc<Self>) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.run.as_ref().map_or(false, |run| run.is_running()) {
            return Err(SearchError::AlreadyIndexing);
        }

        let run = Arc::new(RunContext::new());
        let previous = slot.handle.take();
        let service = self.clone();
        let task_run = run.clone();
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                // 等待上一次运行的任务全部结束
                if let Err(e) = previous.await {
                    tracing::warn!("Previous indexing run ended abnormally: {}", e);
                }
            }
            service.run_all(&task_run).await;
            task_run.finish();
        });

        slot.run = Some(run);
        slot.handle = Some(handle);
        Ok(())
    }

    async fn run_all(&self, run: &Arc<RunContext>) {
        if let Err(e) = self.clear_all().await {
            tracing::error!("Failed to clear storage before indexing: {}", e);
            return;
        }
        tracing::info!("Indexing started: {} sites", self.sites.len());

        for config in &self.sites {
            if !run.is_enabled() {
                tracing::info!("Indexing of {} skipped, run was stopped", config.name);
                continue;
            }

            let site = match self.lifecycle.begin(config).await {
                Ok(site) => site,
                Err(e) => {
                    tracing::error!("Failed to create site {}: {}", config.url, e);
                    continue;
                }
            };

            let result = self.crawler.crawl_site(run.clone(), site.clone(), &config.url).await;
            let finished = match result {
                Ok(()) if run.is_enabled() => self.lifecycle.complete(&site).await,
                Ok(()) => self.lifecycle.stop(site.id).await,
                Err(e) => self.lifecycle.fail(&site, &e.to_string()).await,
            };
            if let Err(e) = finished {
                tracing::error!("Failed to update status of {}: {}", site.url, e);
            }

            let stats = run.stats();
            tracing::info!(
                "Site {} done: {} pages saved, {} failed, {} skipped, {} links visited in this run",
                site.name,
                stats.pages_saved,
                stats.pages_failed,
                stats.pages_skipped,
                stats.links_visited
            );
        }

        tracing::info!("Indexing run finished");
    }

    /// Stop the active run, false when nothing was running / 停止索引
    pub async fn stop_indexing(&self) -> Result<bool> {
        let run = self.slot.lock().run.clone();
        let Some(run) = run.filter(|run| run.is_running()) else {
            tracing::info!("Indexing is not running");
            return Ok(false);
        };

        if let Some(site_id) = run.stop() {
            self.lifecycle.stop(site_id).await?;
        }
        tracing::info!("Indexing stopped by user");
        Ok(true)
    }

    /// Wait until the current run and its tasks are gone / 等待当前运行结束
    pub async fn wait_idle(&self) {
        let handle = self.slot.lock().handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Indexing run ended abnormally: {}", e);
            }
        }
    }

    /// Configured site whose url prefixes the link / 链接所属的配置站点
    pub fn site_for_link(&self, link: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| is_under_prefix(link, &site.url))
    }

    pub fn is_link_from_config(&self, link: &str) -> bool {
        self.site_for_link(link).is_some()
    }

    /// Delete the page (if stored) and crawl it again, alone / 重新索引单个页面
    pub async fn index_one_page(&self, link: &str) -> Result<()> {
        let config = self
            .site_for_link(link)
            .ok_or_else(|| SearchError::OutsideConfiguredSites(link.to_string()))?;
        Url::parse(link)?;

        let site = match self.store.find_site_by_url(&config.url).await? {
            Some(site) => site,
            None => {
                let mut site = Site::new(&config.url, &config.name, SiteStatus::Indexed);
                self.store.save_site(&mut site).await?;
                site
            }
        };

        let path = site_relative_path(link)?;
        if let Some(page) = self.store.find_page_by_path(site.id, &path).await? {
            self.index_builder.remove_page(&page).await?;
            self.store.delete_page(page.id).await?;
            tracing::info!("Page {} removed before re-indexing", path);
        }

        let outcome = self.crawler.index_page(&site, link).await?;
        tracing::info!("Page {} indexed with status {}", path, outcome.status);
        Ok(())
    }

    /// Wipe sites, pages, lemmas and postings / 清空所有数据
    pub async fn clear_all(&self) -> Result<()> {
        self.store.delete_all().await
    }
}
