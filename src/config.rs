//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SearchError};

/// Environment variable overriding the config file location / 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "SEARCH_CONFIG";

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Database configuration / 数据库配置
    pub database: DatabaseConfig,
    /// Crawling and indexing configuration / 爬取与索引配置
    pub indexing: IndexingConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Database configuration / 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Database file path (relative to data_dir) / 数据库文件路径
    pub db_file: String,
}

/// One site to crawl / 待索引站点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Seed url, also the origin prefix of the site / 种子地址，同时也是站点前缀
    pub url: String,
    /// Display name / 显示名称
    pub name: String,
}

/// Crawling and indexing configuration / 爬取与索引配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Sites crawled in this order / 按顺序爬取的站点
    pub sites: Vec<SiteConfig>,
    pub user_agent: String,
    pub referrer: String,
    /// Delay before every fetch / 每次请求前的礼貌延迟
    pub politeness_delay_ms: u64,
    /// Timeout of a single request / 单次请求超时
    pub request_timeout_ms: u64,
    /// Worker pool size per site / 每个站点的并发数
    pub max_concurrency: usize,
    /// Links ending with these extensions are never fetched / 不抓取的扩展名
    pub blocked_extensions: Vec<String>,
    /// Optional word-form dictionary (form, lemma, tags per line) / 可选词形词典
    pub morphology_dictionary: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_file: "search.db".to_string(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            user_agent: "SiteSearchBot/0.1".to_string(),
            referrer: "http://www.google.com".to_string(),
            politeness_delay_ms: 3000,
            request_timeout_ms: 3000,
            max_concurrency: num_cpus::get(),
            blocked_extensions: default_blocked_extensions(),
            morphology_dictionary: None,
        }
    }
}

fn default_blocked_extensions() -> Vec<String> {
    [
        "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "pdf", "eps", "xls", "xlsx", "doc",
        "docx", "ppt", "pptx", "zip", "rar", "gz", "tar", "7z", "mp3", "mp4", "avi", "wma",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl AppConfig {
    /// Get the full database URL / 获取完整的数据库URL
    pub fn get_database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.get_database_path().to_string_lossy())
    }

    /// Get the database file path / 获取数据库文件路径
    pub fn get_database_path(&self) -> PathBuf {
        self.get_data_dir().join(&self.database.db_file)
    }

    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.database.data_dir)
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Get the config file path / 获取配置文件路径
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from the default location / 从默认位置加载配置
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&get_config_path())
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| SearchError::Config(format!("Failed to parse config file: {}", e)))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        let config = AppConfig::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config_path: &Path, config: &AppConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| SearchError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(config_path, content)?;
    Ok(())
}
