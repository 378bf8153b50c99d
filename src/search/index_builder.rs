//! Index builder - page lemma map to postings and lemma frequencies / 索引构建器
//!
//! All writes for one site are serialized by a per-site lock, so two pages
//! sharing a lemma never lose a frequency increment.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Lemma, Page, Posting};
use crate::storage::SearchStore;
use crate::utils::KeyedLocks;

pub struct IndexBuilder {
    store: Arc<dyn SearchStore>,
    site_locks: KeyedLocks<i64>,
}

impl IndexBuilder {
    pub fn new(store: Arc<dyn SearchStore>) -> Self {
        Self {
            store,
            site_locks: KeyedLocks::new(),
        }
    }

    /// Add the page's lemmas to the index / 将页面词元写入索引
    ///
    /// Creates missing lemmas with frequency 1, increments existing ones once per
    /// page, and upserts one posting per lemma with rank = count.
    pub async fn apply_page(&self, page: &Page, lemmas: &BTreeMap<String, u32>) -> Result<()> {
        let _guard = self.site_locks.lock(&page.site_id).await;
        self.apply_locked(page, lemmas).await
    }

    /// Remove the page's postings and its share of lemma frequencies / 移除页面索引
    pub async fn remove_page(&self, page: &Page) -> Result<u64> {
        let _guard = self.site_locks.lock(&page.site_id).await;
        self.store.delete_page_postings(page.id).await
    }

    async fn apply_locked(&self, page: &Page, lemmas: &BTreeMap<String, u32>) -> Result<()> {
        // 已经索引过的词元不再增加文档频率
        let indexed: HashSet<i64> = self
            .store
            .find_postings_by_page(page.id)
            .await?
            .into_iter()
            .map(|posting| posting.lemma_id)
            .collect();

        for (text, count) in lemmas {
            let lemma = match self.store.find_lemma(page.site_id, text).await? {
                Some(mut lemma) => {
                    if !indexed.contains(&lemma.id) {
                        lemma.frequency += 1;
                        self.store.save_lemma(&mut lemma).await?;
                    }
                    lemma
                }
                None => {
                    let mut lemma = Lemma {
                        id: 0,
                        site_id: page.site_id,
                        lemma: text.clone(),
                        frequency: 1,
                    };
                    self.store.save_lemma(&mut lemma).await?;
                    lemma
                }
            };

            let mut posting = Posting {
                id: 0,
                page_id: page.id,
                lemma_id: lemma.id,
                rank: i64::from(*count),
            };
            self.store.save_posting(&mut posting).await?;
        }

        tracing::debug!("Indexed page {} ({} lemmas)", page.path, lemmas.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Site, SiteStatus};
    use crate::storage::SqliteStore;

    async fn setup(dir: &tempfile::TempDir) -> (Arc<SqliteStore>, IndexBuilder, Site) {
        let store = Arc::new(SqliteStore::open(&dir.path().join("search.db")).await.unwrap());
        let builder = IndexBuilder::new(store.clone());
        let mut site = Site::new("https://example.com/", "Example", SiteStatus::Indexing);
        store.save_site(&mut site).await.unwrap();
        (store, builder, site)
    }

    fn lemma_map(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    async fn saved_page(store: &SqliteStore, site: &Site, path: &str) -> Page {
        let mut page = Page::new(site.id, path, 200, "");
        store.save_page(&mut page).await.unwrap();
        page
    }

    #[tokio::test]
    async fn test_frequency_counts_pages() {
        let dir = tempfile::tempdir().unwrap();
        let (store, builder, site) = setup(&dir).await;
        let first = saved_page(&store, &site, "/1").await;
        let second = saved_page(&store, &site, "/2").await;

        builder.apply_page(&first, &lemma_map(&[("кот", 3), ("дом", 1)])).await.unwrap();
        builder.apply_page(&second, &lemma_map(&[("кот", 1)])).await.unwrap();

        let cat = store.find_lemma(site.id, "кот").await.unwrap().unwrap();
        let house = store.find_lemma(site.id, "дом").await.unwrap().unwrap();
        assert_eq!(cat.frequency, 2);
        assert_eq!(house.frequency, 1);

        let postings = store.find_postings_by_page(first.id).await.unwrap();
        let cat_posting = postings.iter().find(|p| p.lemma_id == cat.id).unwrap();
        assert_eq!(cat_posting.rank, 3);
    }

    #[tokio::test]
    async fn test_remove_then_apply_restores_postings() {
        let dir = tempfile::tempdir().unwrap();
        let (store, builder, site) = setup(&dir).await;
        let page = saved_page(&store, &site, "/").await;
        let lemmas = lemma_map(&[("кот", 2), ("собак", 1)]);

        builder.apply_page(&page, &lemmas).await.unwrap();
        let once = store.find_postings_by_page(page.id).await.unwrap();

        builder.remove_page(&page).await.unwrap();
        builder.apply_page(&page, &lemmas).await.unwrap();
        builder.apply_page(&page, &lemmas).await.unwrap();
        let again = store.find_postings_by_page(page.id).await.unwrap();

        assert_eq!(once.len(), again.len());
        for lemma in ["кот", "собак"] {
            let lemma = store.find_lemma(site.id, lemma).await.unwrap().unwrap();
            assert_eq!(lemma.frequency, 1);
        }
    }

    #[tokio::test]
    async fn test_remove_page_keeps_frequency_within_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let (store, builder, site) = setup(&dir).await;
        let first = saved_page(&store, &site, "/1").await;
        let second = saved_page(&store, &site, "/2").await;
        builder.apply_page(&first, &lemma_map(&[("кот", 1)])).await.unwrap();
        builder.apply_page(&second, &lemma_map(&[("кот", 1), ("дом", 4)])).await.unwrap();

        assert_eq!(builder.remove_page(&second).await.unwrap(), 2);

        let cat = store.find_lemma(site.id, "кот").await.unwrap().unwrap();
        assert_eq!(cat.frequency, 1);
        assert!(store.find_lemma(site.id, "дом").await.unwrap().is_none());
        assert!(cat.frequency <= store.count_pages(site.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_pages_do_not_lose_increments() {
        let dir = tempfile::tempdir().unwrap();
        let (store, builder, site) = setup(&dir).await;
        let builder = Arc::new(builder);

        let mut pages = Vec::new();
        for i in 0..8 {
            pages.push(saved_page(&store, &site, &format!("/{}", i)).await);
        }

        let mut tasks = tokio::task::JoinSet::new();
        for page in pages {
            let builder = builder.clone();
            tasks.spawn(async move { builder.apply_page(&page, &lemma_map(&[("кот", 1)])).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let cat = store.find_lemma(site.id, "кот").await.unwrap().unwrap();
        assert_eq!(cat.frequency, 8);
    }
}
