/// Url and locking utility functions / 链接与锁工具函数

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use url::Url;

use crate::error::Result;

/// Site-relative path of an absolute url / 获取链接的站内路径
/// "https://example.com/news/1" -> "/news/1"
pub fn site_relative_path(link: &str) -> Result<String> {
    let url = Url::parse(link)?;
    let path = url.path();
    if path.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(path.to_string())
    }
}

/// Whether the link lies under the site prefix, on a path segment boundary / 链接是否属于站点前缀
/// "https://example.com/news" is under "https://example.com", "https://example.com.evil.org/" is not
pub fn is_under_prefix(link: &str, prefix: &str) -> bool {
    let link = link.trim().to_lowercase();
    let prefix = prefix.trim().trim_end_matches('/').to_lowercase();
    match link.strip_prefix(&prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Get file extension of the url path (lowercase) / 获取链接路径的扩展名
pub fn get_ext(link: &str) -> String {
    let path = match Url::parse(link) {
        Ok(url) => url.path().to_string(),
        Err(_) => link.to_string(),
    };
    let name = path.rsplit('/').next().unwrap_or("");
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() => name[pos + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// Per-key async mutexes, e.g. one per site / 按键分配的异步锁
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for the lock of `key` / 获取指定键的锁
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop every lock nobody holds / 清理空闲锁
    pub fn prune(&self) {
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
