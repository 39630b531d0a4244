//! Per-run crawl context / 单次运行的爬取上下文
//!
//! Built fresh for every indexing run and shared by all crawl units of that run.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct CrawlContext {
    /// Normalized URLs already claimed by a crawl unit / 已访问URL
    visited: Mutex<HashSet<String>>,
    stop_flag: AtomicBool,
    /// Fetches reserved so far, never above `max_pages` / 已预留的抓取数
    reserved: AtomicUsize,
    max_pages: usize,
}

impl CrawlContext {
    pub fn new(max_pages: usize) -> Self {
        Self {
            visited: Mutex::new(HashSet::new()),
            stop_flag: AtomicBool::new(false),
            reserved: AtomicUsize::new(0),
            max_pages,
        }
    }

    /// Test-and-mark; true only for the first caller with this URL / 原子地检查并标记
    pub fn mark_visited(&self, url: &str) -> bool {
        self.visited.lock().insert(url.to_string())
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    /// Reserve one fetch from the page budget / 从页面预算中预留一次抓取
    pub fn try_reserve(&self) -> bool {
        self.reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_pages).then_some(n + 1)
            })
            .is_ok()
    }

    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::SeqCst)
    }
}
