//! Search over the lemma index / 搜索模块
//!
//! Read-only: the indexing side owns every write. / 只读，写入由索引侧负责

pub mod engine;

pub use engine::{relevance, SearchEngine};
