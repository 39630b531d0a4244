//! Persisted rows and derived DTOs / 数据模型

use serde::{Deserialize, Serialize};

use crate::error::InvalidRank;

/// Site indexing status / 站点索引状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
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

    /// Parse the stored column value; unknown values read as FAILED / 解析数据库中的状态
    pub fn parse(s: &str) -> Self {
        match s {
            "INDEXING" => SiteStatus::Indexing,
            "INDEXED" => SiteStatus::Indexed,
            _ => SiteStatus::Failed,
        }
    }
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seed site row / 站点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    /// RFC 3339 timestamp of the last status change / 状态更新时间
    pub status_time: String,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    pub id: i64,
    pub site_id: i64,
    /// Absolute URL path plus query, the site root's own path included / 页面路径
    pub path: String,
    pub title: String,
    /// Extracted plain text / 纯文本内容
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lemma {
    pub id: i64,
    pub site_id: i64,
    pub text: String,
    pub frequency: i64,
}

/// One (page, lemma) association / 倒排索引条目
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexEntry {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank_value: f32,
}

impl IndexEntry {
    /// Validate a rank value before it is written / 校验权重范围
    pub fn check_rank(rank_value: f32) -> Result<f32, InvalidRank> {
        if (0.0..=1.0).contains(&rank_value) {
            Ok(rank_value)
        } else {
            Err(InvalidRank(rank_value))
        }
    }
}

/// Search result (derived, not persisted) / 搜索结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub site: String,
    pub site_name: String,
    pub page_url: String,
    pub title: String,
    pub snippet: String,
    pub relevance: f32,
}

/// Totals across all sites / 全局统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TotalStatistics {
    pub sites: u64,
    pub pages: u64,
    pub lemmas: u64,
    pub indexing: bool,
}

/// Per-site statistics / 站点统计
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatistics {
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    pub status_time: String,
    pub error: Option<String>,
    pub pages: u64,
    pub lemmas: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub total: TotalStatistics,
    pub detailed: Vec<SiteStatistics>,
}
