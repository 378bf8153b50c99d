//! SQLite 存储实现
//!
//! 表结构：
//! - site：站点及其索引状态
//! - page：页面（site_id + path 唯一）
//! - lemma：站点内词元（site_id + lemma 唯一），frequency 为文档频率
//! - search_index：倒排索引（page_id + lemma_id 唯一），lemma_rank 为页内词频
//!
//! 特性：
//! - WAL 模式 + busy_timeout（并发写安全）
//! - 外键级联删除
//! - 删除页面索引时同步回退词元频率

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, QueryBuilder, Row, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::SearchStore;
use crate::error::Result;
use crate::models::{Lemma, Page, Posting, Site, SiteStatus};

/// SQLite search store / SQLite 搜索存储
pub struct SqliteStore {
    db: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database file / 打开或创建数据库文件
    pub async fn open(path: &Path) -> Result<Self> {
        // 确保目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new().filename(path);
        let store = Self::connect_with(options).await?;
        tracing::info!("Search database opened: {:?} (WAL mode)", path);
        Ok(store)
    }

    /// Connect by sqlite url, e.g. `sqlite:data/search.db?mode=rwc` / 按URL连接
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?;
        let store = Self::connect_with(options).await?;
        tracing::info!("Search database connected: {}", url);
        Ok(store)
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self> {
        let options = options
            .create_if_missing(true)
            // 启用WAL模式，提高并发性能
            .journal_mode(SqliteJournalMode::Wal)
            // 优化写入性能
            .synchronous(SqliteSynchronous::Normal)
            // 设置busy_timeout，避免锁超时
            .busy_timeout(Duration::from_secs(10))
            .foreign_keys(true);

        let db = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { db };
        store.init().await?;
        Ok(store)
    }

    /// 关闭数据库连接池 / Close database connection pool
    pub async fn close(&self) {
        self.db.close().await;
    }

    /// 初始化表结构，只在表不存在时创建
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS site (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                status TEXT NOT NULL,
                status_time TEXT NOT NULL,
                last_error TEXT,
                url TEXT NOT NULL,
                name TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS page (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                path TEXT NOT NULL,
                code INTEGER NOT NULL,
                content TEXT NOT NULL,
                UNIQUE(site_id, path),
                FOREIGN KEY (site_id) REFERENCES site(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lemma (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL,
                lemma TEXT NOT NULL,
                frequency INTEGER NOT NULL,
                UNIQUE(site_id, lemma),
                FOREIGN KEY (site_id) REFERENCES site(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_index (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                page_id INTEGER NOT NULL,
                lemma_id INTEGER NOT NULL,
                lemma_rank INTEGER NOT NULL,
                UNIQUE(page_id, lemma_id),
                FOREIGN KEY (page_id) REFERENCES page(id) ON DELETE CASCADE,
                FOREIGN KEY (lemma_id) REFERENCES lemma(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        // 查询按词元文本检索（不限站点）
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_lemma_text ON lemma(lemma)")
            .execute(&self.db)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_index_lemma ON search_index(lemma_id)")
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Decrement the frequency of every lemma the page references, drop lemmas that reach zero
    async fn release_page_lemmas(tx: &mut Transaction<'_, Sqlite>, page_id: i64) -> Result<u64> {
        sqlx::query(
            "UPDATE lemma SET frequency = frequency - 1 \
             WHERE id IN (SELECT lemma_id FROM search_index WHERE page_id = ?)",
        )
        .bind(page_id)
        .execute(&mut **tx)
        .await?;

        let removed = sqlx::query("DELETE FROM search_index WHERE page_id = ?")
            .bind(page_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM lemma WHERE frequency <= 0")
            .execute(&mut **tx)
            .await?;

        Ok(removed)
    }
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn site_from_row(row: &SqliteRow) -> Result<Site> {
    let status: String = row.try_get("status")?;
    let status_time: String = row.try_get("status_time")?;

    let status = status.parse::<SiteStatus>().map_err(decode_error)?;
    let status_time = DateTime::parse_from_rfc3339(&status_time)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_error(e.to_string()))?;

    Ok(Site {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        status,
        status_time,
        last_error: row.try_get("last_error")?,
    })
}

fn page_from_row(row: &SqliteRow) -> Result<Page> {
    let code: i64 = row.try_get("code")?;
    Ok(Page {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        path: row.try_get("path")?,
        code: u16::try_from(code).map_err(|e| decode_error(e.to_string()))?,
        content: row.try_get("content")?,
    })
}

fn lemma_from_row(row: &SqliteRow) -> Result<Lemma> {
    Ok(Lemma {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        lemma: row.try_get("lemma")?,
        frequency: row.try_get("frequency")?,
    })
}

fn posting_from_row(row: &SqliteRow) -> Result<Posting> {
    Ok(Posting {
        id: row.try_get("id")?,
        page_id: row.try_get("page_id")?,
        lemma_id: row.try_get("lemma_id")?,
        rank: row.try_get("lemma_rank")?,
    })
}

const SITE_COLUMNS: &str = "id, status, status_time, last_error, url, name";
const PAGE_COLUMNS: &str = "id, site_id, path, code, content";
const LEMMA_COLUMNS: &str = "id, site_id, lemma, frequency";

#[async_trait]
impl SearchStore for SqliteStore {
    async fn site_exists_by_url(&self, url: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM site WHERE url = ?")
            .bind(url)
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn site_exists_by_status(&self, status: SiteStatus) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM site WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn find_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        let row = sqlx::query(&format!("SELECT {} FROM site WHERE url = ? ORDER BY id DESC LIMIT 1", SITE_COLUMNS))
            .bind(url)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(site_from_row).transpose()
    }

    async fn find_site_by_id(&self, id: i64) -> Result<Option<Site>> {
        let row = sqlx::query(&format!("SELECT {} FROM site WHERE id = ?", SITE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(site_from_row).transpose()
    }

    async fn list_sites(&self) -> Result<Vec<Site>> {
        let rows = sqlx::query(&format!("SELECT {} FROM site ORDER BY id", SITE_COLUMNS))
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(site_from_row).collect()
    }

    async fn save_site(&self, site: &mut Site) -> Result<()> {
        let status_time = site.status_time.to_rfc3339();

        if site.id == 0 {
            let result = sqlx::query(
                "INSERT INTO site (status, status_time, last_error, url, name) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(site.status.as_str())
            .bind(&status_time)
            .bind(&site.last_error)
            .bind(&site.url)
            .bind(&site.name)
            .execute(&self.db)
            .await?;
            site.id = result.last_insert_rowid();
        } else {
            sqlx::query(
                "UPDATE site SET status = ?, status_time = ?, last_error = ?, url = ?, name = ? WHERE id = ?",
            )
            .bind(site.status.as_str())
            .bind(&status_time)
            .bind(&site.last_error)
            .bind(&site.url)
            .bind(&site.name)
            .bind(site.id)
            .execute(&self.db)
            .await?;
        }
        Ok(())
    }

    async fn transition_site_status(
        &self,
        site_id: i64,
        from: SiteStatus,
        to: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Ok(false);
        }

        // 只在当前状态仍为 from 时迁移；last_error 为空时保留原有错误
        let result = sqlx::query(
            "UPDATE site SET status = ?, status_time = ?, last_error = COALESCE(?, last_error) \
             WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(last_error)
        .bind(site_id)
        .bind(from.as_str())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_site_error(&self, site_id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE site SET last_error = ?, status_time = ? WHERE id = ?")
            .bind(error)
            .bind(Utc::now().to_rfc3339())
            .bind(site_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn touch_site(&self, site_id: i64) -> Result<()> {
        sqlx::query("UPDATE site SET status_time = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(site_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_site(&self, site_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM site WHERE id = ?")
            .bind(site_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn page_exists(&self, site_id: i64, path: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM page WHERE site_id = ? AND path = ?")
            .bind(site_id)
            .bind(path)
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn find_page_by_path(&self, site_id: i64, path: &str) -> Result<Option<Page>> {
        let row = sqlx::query(&format!("SELECT {} FROM page WHERE site_id = ? AND path = ?", PAGE_COLUMNS))
            .bind(site_id)
            .bind(path)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(page_from_row).transpose()
    }

    async fn find_pages_by_site(&self, site_id: i64) -> Result<Vec<Page>> {
        let rows = sqlx::query(&format!("SELECT {} FROM page WHERE site_id = ? ORDER BY id", PAGE_COLUMNS))
            .bind(site_id)
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(page_from_row).collect()
    }

    async fn find_pages_by_ids(&self, ids: &[i64]) -> Result<Vec<Page>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM page WHERE id IN (", PAGE_COLUMNS));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(&self.db).await?;
        rows.iter().map(page_from_row).collect()
    }

    async fn count_pages(&self, site_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM page WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn save_page(&self, page: &mut Page) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO page (site_id, path, code, content) VALUES (?, ?, ?, ?) \
             ON CONFLICT(site_id, path) DO NOTHING",
        )
        .bind(page.site_id)
        .bind(&page.path)
        .bind(i64::from(page.code))
        .bind(&page.content)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        page.id = result.last_insert_rowid();
        Ok(true)
    }

    async fn delete_page(&self, page_id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;
        Self::release_page_lemmas(&mut tx, page_id).await?;
        sqlx::query("DELETE FROM page WHERE id = ?")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_lemma(&self, site_id: i64, lemma: &str) -> Result<Option<Lemma>> {
        let row = sqlx::query(&format!("SELECT {} FROM lemma WHERE site_id = ? AND lemma = ?", LEMMA_COLUMNS))
            .bind(site_id)
            .bind(lemma)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(lemma_from_row).transpose()
    }

    async fn find_lemmas_by_text(&self, lemma: &str, site_id: Option<i64>) -> Result<Vec<Lemma>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM lemma WHERE lemma = ? AND (? IS NULL OR site_id = ?) \
             ORDER BY frequency ASC, id ASC",
            LEMMA_COLUMNS
        ))
        .bind(lemma)
        .bind(site_id)
        .bind(site_id)
        .fetch_all(&self.db)
        .await?;
        rows.iter().map(lemma_from_row).collect()
    }

    async fn count_lemmas(&self, site_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lemma WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn save_lemma(&self, lemma: &mut Lemma) -> Result<()> {
        if lemma.id == 0 {
            let result = sqlx::query("INSERT INTO lemma (site_id, lemma, frequency) VALUES (?, ?, ?)")
                .bind(lemma.site_id)
                .bind(&lemma.lemma)
                .bind(lemma.frequency)
                .execute(&self.db)
                .await?;
            lemma.id = result.last_insert_rowid();
        } else {
            sqlx::query("UPDATE lemma SET frequency = ? WHERE id = ?")
                .bind(lemma.frequency)
                .bind(lemma.id)
                .execute(&self.db)
                .await?;
        }
        Ok(())
    }

    async fn find_postings_by_lemmas(&self, lemma_ids: &[i64]) -> Result<Vec<Posting>> {
        if lemma_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, page_id, lemma_id, lemma_rank FROM search_index WHERE lemma_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in lemma_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY page_id, id");

        let rows = builder.build().fetch_all(&self.db).await?;
        rows.iter().map(posting_from_row).collect()
    }

    async fn find_postings_by_page(&self, page_id: i64) -> Result<Vec<Posting>> {
        let rows = sqlx::query(
            "SELECT id, page_id, lemma_id, lemma_rank FROM search_index WHERE page_id = ? ORDER BY lemma_id",
        )
        .bind(page_id)
        .fetch_all(&self.db)
        .await?;
        rows.iter().map(posting_from_row).collect()
    }

    async fn save_posting(&self, posting: &mut Posting) -> Result<()> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO search_index (page_id, lemma_id, lemma_rank) VALUES (?, ?, ?) \
             ON CONFLICT(page_id, lemma_id) DO UPDATE SET lemma_rank = excluded.lemma_rank \
             RETURNING id",
        )
        .bind(posting.page_id)
        .bind(posting.lemma_id)
        .bind(posting.rank)
        .fetch_one(&self.db)
        .await?;
        posting.id = id;
        Ok(())
    }

    async fn delete_page_postings(&self, page_id: i64) -> Result<u64> {
        let mut tx = self.db.begin().await?;
        let removed = Self::release_page_lemmas(&mut tx, page_id).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM search_index").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM lemma").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM page").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM site").execute(&mut *tx).await?;
        tx.commit().await?;
        tracing::info!("All search tables cleared");
        Ok(())
    }
}
