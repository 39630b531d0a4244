//! Concurrent site crawler / 并发站点爬虫

mod context;
mod engine;
mod fetcher;

pub use context::CrawlContext;
pub use engine::{CrawlEngine, CrawlReport};
pub use fetcher::{FetchedPage, HttpFetcher, PageFetcher};

#[cfg(test)]
pub(crate) use fetcher::scripted::ScriptedFetcher;
