//! HTML text and link extraction built on `scraper` / HTML 文本与链接提取
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so callers
//! parse, extract and drop the document before their next await point.

use scraper::{Html, Selector};
use url::Url;

/// Elements whose text never counts as page content / 不计入正文的元素
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template", "svg"];

/// Resources that are never HTML pages / 非页面资源后缀
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".bmp", ".pdf", ".doc", ".docx",
    ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".rar", ".7z", ".gz", ".tar", ".mp3", ".mp4",
    ".avi", ".mov", ".webm", ".exe", ".dmg", ".apk", ".css", ".js", ".xml", ".json",
];

/// `<title>`, falling back to the first `<h1>` / 页面标题
pub fn extract_title(document: &Html) -> String {
    for selector in ["title", "h1"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let title = collapse_whitespace(&element.text().collect::<String>());
            if !title.is_empty() {
                return title;
            }
        }
    }
    String::new()
}

/// Visible text of the document body, whitespace collapsed / 提取正文纯文本
pub fn extract_text(document: &Html) -> String {
    let mut raw = String::new();
    for node in document.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|element| SKIPPED_ELEMENTS.contains(&element.name()))
                .unwrap_or(false)
        });
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }
    collapse_whitespace(&raw)
}

/// Every `a[href]` resolved to a normalized absolute URL / 提取链接
pub fn extract_links(document: &Html, base: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        match base.join(href) {
            Ok(url) => links.push(normalize_url(url)),
            Err(e) => tracing::debug!("Skipping malformed link {:?} on {}: {}", href, base, e),
        }
    }
    links
}

/// Strip the fragment and any trailing slash except the root path / URL 规范化
pub fn normalize_url(mut url: Url) -> Url {
    url.set_fragment(None);
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    }
    url
}

/// Same scheme family, host and port / 是否同一主机
pub fn same_host(candidate: &Url, root: &Url) -> bool {
    matches!(candidate.scheme(), "http" | "https")
        && candidate.host_str().is_some()
        && candidate.host_str() == root.host_str()
        && candidate.port_or_known_default() == root.port_or_known_default()
}

/// Whether a URL lies under a site root (host and path prefix) / 是否属于站点
pub fn belongs_to_site(candidate: &Url, root: &Url) -> bool {
    if !same_host(candidate, root) {
        return false;
    }
    let prefix = root.path().trim_end_matches('/');
    let path = candidate.path();
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

/// Crawl filter: same site and not an obvious binary resource / 爬取过滤
pub fn is_crawlable(candidate: &Url, root: &Url) -> bool {
    if !belongs_to_site(candidate, root) {
        return false;
    }
    let path = candidate.path().to_lowercase();
    !SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Page key stored in `page.path`: path plus query / 页面路径
pub fn page_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// `scheme://host[:port]` of a URL / 站点根地址
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
