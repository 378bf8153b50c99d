//! Link validity predicate / 链接过滤

use crate::utils::{get_ext, is_under_prefix};

/// Query parameter selecting a page language / 语言切换参数
const LANGUAGE_SELECTOR: &str = "lang=";

/// Whether a discovered link may be fetched / 链接是否可以抓取
///
/// Rejects blocked extensions, language selectors, fragments, query strings and
/// anything outside the site's origin prefix. The check runs on the lowercase form.
pub fn is_valid_link(link: &str, site_prefix: &str, blocked_extensions: &[String]) -> bool {
    let link = link.trim().to_lowercase();
    if link.is_empty() {
        return false;
    }
    if link.contains('#') || link.contains('?') || link.contains(LANGUAGE_SELECTOR) {
        return false;
    }
    if !is_under_prefix(&link, site_prefix) {
        return false;
    }

    let ext = get_ext(&link);
    ext.is_empty() || !blocked_extensions.iter().any(|blocked| blocked.eq_ignore_ascii_case(&ext))
}
