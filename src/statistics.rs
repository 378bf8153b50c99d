//! Statistics - totals and per-site detail / 统计信息

use serde::Serialize;

use crate::config::SiteConfig;
use crate::error::Result;
use crate::storage::SearchStore;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TotalStatistics {
    /// Configured sites / 配置的站点数
    pub sites: usize,
    pub pages: i64,
    pub lemmas: i64,
    pub indexing: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStatisticsItem {
    pub url: String,
    pub name: String,
    pub status: String,
    /// Milliseconds since epoch / 毫秒时间戳
    pub status_time: i64,
    pub error: Option<String>,
    pub pages: i64,
    pub lemmas: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatisticsData {
    pub total: TotalStatistics,
    pub detailed: Vec<DetailedStatisticsItem>,
}

/// Collect statistics for the configured sites that exist in storage / 汇总统计
pub async fn collect_statistics(
    store: &dyn SearchStore,
    sites: &[SiteConfig],
    indexing: bool,
) -> Result<StatisticsData> {
    let mut total = TotalStatistics {
        sites: sites.len(),
        indexing,
        ..TotalStatistics::default()
    };

    let mut detailed = Vec::new();
    for config in sites {
        let Some(site) = store.find_site_by_url(&config.url).await? else {
            continue;
        };
        let pages = store.count_pages(site.id).await?;
        let lemmas = store.count_lemmas(site.id).await?;
        total.pages += pages;
        total.lemmas += lemmas;

        detailed.push(DetailedStatisticsItem {
            url: config.url.clone(),
            name: config.name.clone(),
            status: site.status.to_string(),
            status_time: site.status_time.timestamp_millis(),
            error: site.last_error,
            pages,
            lemmas,
        });
    }

    Ok(StatisticsData { total, detailed })
}
