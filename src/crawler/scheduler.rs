//! Crawl scheduler - concurrent recursive site traversal / 爬取调度
//!
//! Each page task fetches and indexes its page, then spawns one child task per
//! new in-scope link and waits for all of them (fork/join). A task holds a pool
//! permit only while it sleeps, fetches and indexes, never while it joins.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use super::context::{PageRecord, RunContext, SiteCrawl};
use super::fetch::HttpFetcher;
use super::lifecycle::SiteLifecycle;
use super::links::is_valid_link;
use crate::config::IndexingConfig;
use crate::error::{Result, SearchError};
use crate::models::{Page, Site};
use crate::search::html::extract_links;
use crate::search::{IndexBuilder, Lemmatizer};
use crate::storage::SearchStore;
use crate::utils::{site_relative_path, KeyedLocks};

/// Outcome of one page / 单个页面的处理结果
#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// Stored page, None when the path was already stored / 新保存的页面
    pub page: Option<Page>,
    /// Observed status (0 = no response) / 状态码
    pub status: u16,
    /// Absolute links found on the page / 页面中的链接
    pub links: Vec<String>,
    /// Whether the page was lemmatized / 是否已建立索引
    pub indexed: bool,
}

impl PageOutcome {
    pub fn record(&self) -> PageRecord {
        match (&self.page, self.indexed) {
            (None, _) => PageRecord::Skipped,
            (Some(_), true) => PageRecord::Indexed,
            (Some(_), false) => PageRecord::Failed,
        }
    }
}

pub struct Crawler {
    store: Arc<dyn SearchStore>,
    fetcher: HttpFetcher,
    lemmatizer: Lemmatizer,
    index_builder: Arc<IndexBuilder>,
    lifecycle: SiteLifecycle,
    page_locks: KeyedLocks<i64>,
    politeness_delay: Duration,
    max_concurrency: usize,
    blocked_extensions: Vec<String>,
}

impl Crawler {
    pub fn new(
        config: &IndexingConfig,
        store: Arc<dyn SearchStore>,
        lemmatizer: Lemmatizer,
        index_builder: Arc<IndexBuilder>,
        lifecycle: SiteLifecycle,
    ) -> Result<Self> {
        Ok(Self {
            store,
            fetcher: HttpFetcher::new(config)?,
            lemmatizer,
            index_builder,
            lifecycle,
            page_locks: KeyedLocks::new(),
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
            max_concurrency: config.max_concurrency.max(1),
            blocked_extensions: config.blocked_extensions.clone(),
        })
    }

    /// Traverse every reachable in-scope page of the site starting at `seed` / 遍历站点
    ///
    /// Returns Err only for failures that must fail the whole site (storage
    /// errors, panicking tasks). Page-level fetch errors are recorded on the site.
    pub async fn crawl_site(self: &Arc<Self>, run: Arc<RunContext>, site: Site, seed: &str) -> Result<()> {
        let pool = Arc::new(Semaphore::new(self.max_concurrency));
        run.activate(site.id, pool.clone());

        let prefix = site.url.trim_end_matches('/').to_string();
        let crawl = Arc::new(SiteCrawl {
            run: run.clone(),
            site,
            pool,
            prefix,
        });

        let result = if is_valid_link(seed, &crawl.prefix, &self.blocked_extensions) && run.try_visit(seed) {
            match tokio::spawn(self.clone().visit(crawl.clone(), seed.to_string())).await {
                Ok(result) => result,
                Err(e) => Err(SearchError::Task(format!("crawl task failed: {}", e))),
            }
        } else {
            tracing::warn!("Seed {} is not a crawlable link of {}", seed, crawl.site.url);
            Ok(())
        };

        run.deactivate(crawl.site.id);
        self.page_locks.prune();
        result
    }

    /// One page task: fetch, index, fork children, join / 单个页面任务
    fn visit(self: Arc<Self>, crawl: Arc<SiteCrawl>, url: String) -> BoxFuture<'static, Result<()>> {
        async move {
            if !crawl.run.is_enabled() {
                return Ok(());
            }

            let links = {
                // 工作池关闭表示已停止
                let Ok(permit) = crawl.pool.clone().acquire_owned().await else {
                    return Ok(());
                };

                tokio::select! {
                    _ = crawl.run.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.politeness_delay) => {}
                }
                if !crawl.run.is_enabled() {
                    return Ok(());
                }

                tracing::debug!("Indexing page {}", url);
                let outcome = self.index_page(&crawl.site, &url).await?;
                crawl.run.record_page(outcome.record());
                drop(permit);
                outcome.links
            };

            if !crawl.run.is_enabled() {
                return Ok(());
            }

            let mut children = JoinSet::new();
            for link in links {
                if is_valid_link(&link, &crawl.prefix, &self.blocked_extensions) && crawl.run.try_visit(&link) {
                    children.spawn(self.clone().visit(crawl.clone(), link));
                }
            }

            let mut first_error: Option<SearchError> = None;
            while let Some(joined) = children.join_next().await {
                let error = match joined {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => e,
                    Err(e) if e.is_panic() => SearchError::Task(format!("crawl task panicked: {}", e)),
                    Err(_) => continue,
                };
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }

            match first_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
        .boxed()
    }

    /// Fetch one page, store it, report its status, index it / 抓取并索引单个页面
    ///
    /// The page is stored only if the site has no page with the same path.
    /// Only stored pages with status below 400 are lemmatized.
    pub async fn index_page(&self, site: &Site, url: &str) -> Result<PageOutcome> {
        let base = Url::parse(url)?;
        let path = site_relative_path(url)?;
        let fetched = self.fetcher.fetch(url).await;

        match &fetched.error {
            Some(error) => self.lifecycle.record_page_error(site.id, error).await?,
            None => self.lifecycle.record_page_status(site.id, fetched.status).await?,
        }
        if fetched.status != 200 {
            tracing::warn!("Page {} returned status {}", url, fetched.status);
        }

        let indexable = fetched.is_indexable();
        let body = fetched.body.unwrap_or_default();
        let links = if indexable { extract_links(&body, &base) } else { Vec::new() };

        let mut page = Page::new(site.id, path, fetched.status, body);
        let saved = {
            let _guard = self.page_locks.lock(&site.id).await;
            if self.store.page_exists(site.id, &page.path).await? {
                false
            } else {
                self.store.save_page(&mut page).await?
            }
        };

        if !saved {
            tracing::debug!("Page {} already stored, skipped", page.path);
            return Ok(PageOutcome {
                page: None,
                status: fetched.status,
                links,
                indexed: false,
            });
        }

        if indexable {
            let lemmas = self.lemmatizer.lemmatize(&page.content);
            self.index_builder.apply_page(&page, &lemmas).await?;
        }

        Ok(PageOutcome {
            page: Some(page),
            status: fetched.status,
            links,
            indexed: indexable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::models::SiteStatus;
    use crate::morphology::SnowballMorphology;
    use crate::storage::SqliteStore;
    use axum::extract::State;
    use axum::http::{header, StatusCode, Uri};
    use axum::response::{Html, IntoResponse, Response};
    use axum::Router;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    type Hits = Arc<Mutex<HashMap<String, usize>>>;

    /// Cyclic link graph with a 404, a redirect and links that must never be fetched
    async fn site_handler(State(hits): State<Hits>, uri: Uri) -> Response {
        let path = uri.path().to_string();
        *hits.lock().entry(path.clone()).or_insert(0) += 1;
        match path.as_str() {
            "/" => Html(
                r#"<html><head><title>Главная</title></head><body>
                <p>Кот живёт на главной странице.</p>
                <a href="/a">a</a> <a href="/b">b</a> <a href="/missing">missing</a>
                <a href="/logo.png">logo</a> <a href="/a#top">anchor</a> <a href="/a?page=2">query</a>
                <a href="https://elsewhere.example/">foreign</a> <a href="/old">old</a>
                </body></html>"#,
            )
            .into_response(),
            "/a" => Html(r#"<p>Собака бегает.</p><a href="/">home</a><a href="/b">b</a>"#).into_response(),
            "/b" => Html(r#"<p>Кот и собака.</p><a href="/a">a</a><a href="/">home</a>"#).into_response(),
            "/old" => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/b")]).into_response(),
            _ => (StatusCode::NOT_FOUND, Html("<p>Нет такой страницы</p>")).into_response(),
        }
    }

    async fn serve(hits: Hits) -> String {
        let app = Router::new().fallback(site_handler).with_state(hits);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn crawler(dir: &tempfile::TempDir, delay_ms: u64) -> (Arc<SqliteStore>, Arc<Crawler>, SiteLifecycle) {
        let store = Arc::new(SqliteStore::open(&dir.path().join("search.db")).await.unwrap());
        let config = IndexingConfig {
            politeness_delay_ms: delay_ms,
            request_timeout_ms: 2000,
            max_concurrency: 4,
            ..IndexingConfig::default()
        };
        let lemmatizer = Lemmatizer::new(Arc::new(SnowballMorphology::new()));
        let index_builder = Arc::new(IndexBuilder::new(store.clone()));
        let lifecycle = SiteLifecycle::new(store.clone());
        let crawler = Crawler::new(&config, store.clone(), lemmatizer, index_builder, lifecycle.clone()).unwrap();
        (store, Arc::new(crawler), lifecycle)
    }

    #[tokio::test]
    async fn test_cyclic_site_is_crawled_once_per_link() {
        let hits: Hits = Arc::new(Mutex::new(HashMap::new()));
        let base = serve(hits.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let (store, crawler, lifecycle) = crawler(&dir, 0).await;

        let site = lifecycle
            .begin(&SiteConfig { url: base.clone(), name: "Test".into() })
            .await
            .unwrap();
        let run = Arc::new(RunContext::new());
        crawler.crawl_site(run.clone(), site.clone(), &format!("{}/", base)).await.unwrap();

        let hits = hits.lock().clone();
        // GET + 状态探测，每个链接恰好两次；/old 的重定向目标多一次 GET
        assert_eq!(hits.get("/"), Some(&2));
        assert_eq!(hits.get("/a"), Some(&2));
        assert_eq!(hits.get("/b"), Some(&3));
        assert_eq!(hits.get("/missing"), Some(&2));
        assert_eq!(hits.get("/old"), Some(&2));
        assert!(!hits.contains_key("/logo.png"));

        let mut paths: Vec<(String, u16)> = store
            .find_pages_by_site(site.id)
            .await
            .unwrap()
            .into_iter()
            .map(|page| (page.path, page.code))
            .collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                ("/".to_string(), 200),
                ("/a".to_string(), 200),
                ("/b".to_string(), 200),
                ("/missing".to_string(), 404),
                ("/old".to_string(), 301),
            ]
        );

        // 404 页面不进入索引
        let missing = store.find_page_by_path(site.id, "/missing").await.unwrap().unwrap();
        assert!(store.find_postings_by_page(missing.id).await.unwrap().is_empty());
        let home = store.find_page_by_path(site.id, "/").await.unwrap().unwrap();
        assert!(!store.find_postings_by_page(home.id).await.unwrap().is_empty());

        assert!(lifecycle.complete(&site).await.unwrap());
        let stored = store.find_site_by_id(site.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SiteStatus::Indexed);
        assert!(stored.last_error.is_some());
        let stats = run.stats();
        assert_eq!(stats.links_visited, 5);
        assert_eq!(stats.pages_saved, 4);
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.pages_skipped, 0);
    }

    #[tokio::test]
    async fn test_index_page_records_missing_page() {
        let hits: Hits = Arc::new(Mutex::new(HashMap::new()));
        let base = serve(hits).await;
        let dir = tempfile::tempdir().unwrap();
        let (store, crawler, lifecycle) = crawler(&dir, 0).await;
        let site = lifecycle
            .begin(&SiteConfig { url: base.clone(), name: "Test".into() })
            .await
            .unwrap();

        let outcome = crawler.index_page(&site, &format!("{}/nowhere", base)).await.unwrap();
        assert_eq!(outcome.status, 404);
        assert!(outcome.links.is_empty());
        let page = outcome.page.unwrap();
        assert_eq!(page.code, 404);
        assert!(page.content.contains("Нет такой страницы"));

        let stored = store.find_site_by_id(site.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SiteStatus::Indexing);
        assert_eq!(stored.last_error.as_deref(), Some("not found"));

        // 同一路径不会重复保存
        let again = crawler.index_page(&site, &format!("{}/nowhere", base)).await.unwrap();
        assert!(again.page.is_none());
        assert_eq!(store.count_pages(site.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_index_page_records_truncated_body() {
        let base = crate::crawler::fetch::tests::serve_truncated().await;
        let dir = tempfile::tempdir().unwrap();
        let (store, crawler, lifecycle) = crawler(&dir, 0).await;
        let site = lifecycle
            .begin(&SiteConfig { url: base.clone(), name: "Test".into() })
            .await
            .unwrap();

        let outcome = crawler.index_page(&site, &format!("{}/", base)).await.unwrap();
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.record(), PageRecord::Failed);
        let page = outcome.page.unwrap();
        assert_eq!(page.code, 200);
        assert!(store.find_postings_by_page(page.id).await.unwrap().is_empty());

        let stored = store.find_site_by_id(site.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SiteStatus::Indexing);
        let error = stored.last_error.unwrap();
        assert!(error.starts_with("failed to read body"), "{}", error);
    }

    #[tokio::test]
    async fn test_stop_during_politeness_delay() {
        let hits: Hits = Arc::new(Mutex::new(HashMap::new()));
        let base = serve(hits.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let (store, crawler, lifecycle) = crawler(&dir, 60_000).await;
        let site = lifecycle
            .begin(&SiteConfig { url: base.clone(), name: "Test".into() })
            .await
            .unwrap();

        let run = Arc::new(RunContext::new());
        let task = {
            let crawler = crawler.clone();
            let run = run.clone();
            let site = site.clone();
            let seed = format!("{}/", base);
            tokio::spawn(async move { crawler.crawl_site(run, site, &seed).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(run.stop(), Some(site.id));
        lifecycle.stop(site.id).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(hits.lock().is_empty());
        assert_eq!(store.count_pages(site.id).await.unwrap(), 0);
        assert!(!lifecycle.complete(&site).await.unwrap());
        let stored = store.find_site_by_id(site.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SiteStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("stopped by user"));
    }
}
