use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Site indexing status / 站点索引状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    Indexing,
    Indexed,
    Failed,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Indexing => "INDEXING",
            SiteStatus::Indexed => "INDEXED",
            SiteStatus::Failed => "FAILED",
        }
    }

    /// Only INDEXING may move, and only to a terminal state / 只有 INDEXING 可以迁移到终态
    pub fn can_transition_to(&self, next: SiteStatus) -> bool {
        matches!(
            (self, next),
            (SiteStatus::Indexing, SiteStatus::Indexed) | (SiteStatus::Indexing, SiteStatus::Failed)
        )
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INDEXING" => Ok(SiteStatus::Indexing),
            "INDEXED" => Ok(SiteStatus::Indexed),
            "FAILED" => Ok(SiteStatus::Failed),
            other => Err(format!("unknown site status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    pub status_time: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl Site {
    /// New unsaved site / 新建站点（未保存）
    pub fn new(url: impl Into<String>, name: impl Into<String>, status: SiteStatus) -> Self {
        Self {
            id: 0,
            url: url.into(),
            name: name.into(),
            status,
            status_time: Utc::now(),
            last_error: None,
        }
    }
}

/// Crawled page / 已抓取页面
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub site_id: i64,
    /// Site-relative path / 站内路径
    pub path: String,
    /// Literal observed HTTP status (0 = no response) / 实际HTTP状态码
    pub code: u16,
    /// Raw HTML / 原始HTML
    pub content: String,
}

impl Page {
    pub fn new(site_id: i64, path: impl Into<String>, code: u16, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            site_id,
            path: path.into(),
            code,
            content: content.into(),
        }
    }
}

/// Site-scoped lemma with its document frequency / 站点内词元及文档频率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lemma {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    /// Number of distinct pages containing the lemma / 包含该词元的页面数
    pub frequency: i64,
}

/// Inverted index row: lemma occurrence count inside one page / 倒排索引行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_text() {
        for status in [SiteStatus::Indexing, SiteStatus::Indexed, SiteStatus::Failed] {
            assert_eq!(status.as_str().parse::<SiteStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<SiteStatus>().is_err());
    }

    #[test]
    fn test_status_transitions() {
        assert!(SiteStatus::Indexing.can_transition_to(SiteStatus::Indexed));
        assert!(SiteStatus::Indexing.can_transition_to(SiteStatus::Failed));
        assert!(!SiteStatus::Failed.can_transition_to(SiteStatus::Indexed));
        assert!(!SiteStatus::Indexed.can_transition_to(SiteStatus::Failed));
    }
}
