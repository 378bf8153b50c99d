//! Query processor and ranker / 查询处理与排序
//!
//! 1. Lemmatize the query into a distinct lemma set
//! 2. Rarity of a lemma = sum of its frequencies over the searched sites, rarest first
//! 3. Intersect page sets rarest first, stop as soon as the set is empty
//! 4. Relevance = sum of ranks of the matched lemmas, divided by the best page's sum
//! 5. Paginate, then build title and snippet for the returned page only

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::html;
use super::lemmatizer::Lemmatizer;
use super::snippet;
use crate::error::{Result, SearchError};
use crate::models::{Page, Posting, Site};
use crate::storage::SearchStore;

/// Default page size / 默认分页大小
pub const DEFAULT_LIMIT: usize = 20;

/// Search request / 搜索请求
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    /// Restrict to one site url / 限定站点
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            site: None,
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One search result / 单条搜索结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub site: String,
    pub site_name: String,
    pub uri: String,
    pub title: String,
    pub snippet: String,
    pub relevance: f32,
}

/// Search response body / 搜索结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    /// Matches before pagination / 分页前的总数
    pub count: usize,
    pub data: Vec<SearchHit>,
}

/// Postings of one query lemma across the searched sites / 单个查询词元的倒排数据
#[derive(Debug, Clone)]
pub struct LemmaPostings {
    pub lemma: String,
    /// Sum of document frequencies / 文档频率之和
    pub rarity: i64,
    pub postings: Vec<Posting>,
}

/// Rank pages matching every lemma / 对同时包含所有词元的页面排序
///
/// Input in any order, returns `(page_id, relevance)` sorted by relevance desc,
/// ties by ascending page id. The best page gets 1.0.
pub fn rank_pages(mut groups: Vec<LemmaPostings>) -> Vec<(i64, f32)> {
    if groups.is_empty() {
        return Vec::new();
    }
    // 稀有的词元在前
    groups.sort_by_key(|group| group.rarity);

    let mut candidates: HashSet<i64> = HashSet::new();
    for (i, group) in groups.iter().enumerate() {
        let pages: HashSet<i64> = group.postings.iter().map(|p| p.page_id).collect();
        if i == 0 {
            candidates = pages;
        } else {
            candidates.retain(|page_id| pages.contains(page_id));
        }
        if candidates.is_empty() {
            tracing::debug!("No page contains lemma '{}' with the rarer ones", group.lemma);
            return Vec::new();
        }
    }

    let mut absolute: HashMap<i64, i64> = HashMap::new();
    for posting in groups.iter().flat_map(|group| group.postings.iter()) {
        if candidates.contains(&posting.page_id) {
            *absolute.entry(posting.page_id).or_insert(0) += posting.rank;
        }
    }

    let max = absolute.values().copied().max().unwrap_or(0);
    let mut ranked: Vec<(i64, f32)> = absolute
        .into_iter()
        .map(|(page_id, sum)| {
            let relevance = if max > 0 { sum as f32 / max as f32 } else { 0.0 };
            (page_id, relevance)
        })
        .collect();
    ranked.sort_by_key(|(page_id, _)| *page_id);
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Query processor / 查询处理器
pub struct QueryProcessor {
    store: Arc<dyn SearchStore>,
    lemmatizer: Lemmatizer,
}

impl QueryProcessor {
    pub fn new(store: Arc<dyn SearchStore>, lemmatizer: Lemmatizer) -> Self {
        Self { store, lemmatizer }
    }

    /// Run a search / 执行搜索
    pub async fn search(&self, request: &SearchQuery) -> Result<SearchResults> {
        if request.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let site_id = match request.site.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(url) => match self.store.find_site_by_url(url).await? {
                Some(site) => Some(site.id),
                None => {
                    tracing::debug!("Search restricted to unknown site {}", url);
                    return Ok(SearchResults::default());
                }
            },
            None => None,
        };

        let lemmas: BTreeSet<String> = self.lemmatizer.lemma_set(&request.query);
        if lemmas.is_empty() {
            return Ok(SearchResults::default());
        }

        let groups = self.collect_postings(&lemmas, site_id).await?;
        let ranked = rank_pages(groups);
        let count = ranked.len();

        let window: Vec<(i64, f32)> = ranked
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect();
        let data = self.build_hits(&request.query, &window).await?;

        tracing::debug!("Search '{}': {} matches, {} returned", request.query, count, data.len());
        Ok(SearchResults { count, data })
    }

    async fn collect_postings(
        &self,
        lemmas: &BTreeSet<String>,
        site_id: Option<i64>,
    ) -> Result<Vec<LemmaPostings>> {
        let mut groups: Vec<LemmaPostings> = Vec::with_capacity(lemmas.len());
        for lemma in lemmas {
            let rows = self.store.find_lemmas_by_text(lemma, site_id).await?;
            // 任何一个词元不存在，交集必然为空
            if rows.is_empty() {
                return Ok(Vec::new());
            }
            let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
            groups.push(LemmaPostings {
                lemma: lemma.clone(),
                rarity: rows.iter().map(|row| row.frequency).sum(),
                postings: self.store.find_postings_by_lemmas(&ids).await?,
            });
        }
        Ok(groups)
    }

    async fn build_hits(&self, query: &str, window: &[(i64, f32)]) -> Result<Vec<SearchHit>> {
        let ids: Vec<i64> = window.iter().map(|(page_id, _)| *page_id).collect();
        let pages: HashMap<i64, Page> = self
            .store
            .find_pages_by_ids(&ids)
            .await?
            .into_iter()
            .map(|page| (page.id, page))
            .collect();

        let mut sites: HashMap<i64, Site> = HashMap::new();
        let mut hits = Vec::with_capacity(window.len());
        for (page_id, relevance) in window {
            let Some(page) = pages.get(page_id) else {
                continue;
            };
            if !sites.contains_key(&page.site_id) {
                if let Some(site) = self.store.find_site_by_id(page.site_id).await? {
                    sites.insert(site.id, site);
                }
            }
            let Some(site) = sites.get(&page.site_id) else {
                continue;
            };

            let text = html::visible_text(&page.content);
            let terms = snippet::highlight_terms(&self.lemmatizer, query, &text);
            hits.push(SearchHit {
                site: site.url.clone(),
                site_name: site.name.clone(),
                uri: page.path.clone(),
                title: html::extract_title(&page.content).unwrap_or_default(),
                snippet: snippet::build_snippet(&text, &terms),
                relevance: *relevance,
            });
        }
        Ok(hits)
    }
}
