//! Indexing: per-page pipeline and site lifecycle / 索引流水线与站点生命周期

mod pipeline;
mod service;

pub use pipeline::{IndexedPage, IndexingPipeline};
pub use service::{IndexingService, STOPPED_BY_USER};
