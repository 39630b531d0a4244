//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Database configuration / 数据库配置
    pub database: DatabaseConfig,
    /// Crawl and indexing configuration / 爬取与索引配置
    pub indexing: IndexingConfig,
    /// Search configuration / 搜索配置
    pub search: SearchConfig,
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

/// Seed site entry / 种子站点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
}

/// How the weight of a (page, lemma) pair is computed / 索引权重计算方式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankWeighting {
    /// Every entry gets `constant_rank` / 固定权重
    Constant,
    /// Occurrences divided by the page's most frequent lemma count / 词频归一化
    TermFrequency,
}

/// Crawl and indexing configuration / 爬取与索引配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Seed sites, read once at the start of every run / 种子站点列表
    pub sites: Vec<SiteConfig>,
    pub user_agent: String,
    pub referrer: String,
    /// Randomized pre-fetch delay bounds / 请求前随机延迟范围
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Connect/read timeout per fetch / 单次请求超时
    pub request_timeout_secs: u64,
    /// Page budget shared by every site of one run / 单次运行的页面上限
    pub max_pages: usize,
    /// Size of the crawl worker pool / 并发抓取数
    pub max_concurrent_fetches: usize,
    /// Pages indexed concurrently per site / 每个站点并发索引页面数
    pub pipeline_workers: usize,
    pub rank_weighting: RankWeighting,
    pub constant_rank: f32,
}

/// Search configuration / 搜索配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Lemmas whose frequency exceeds this share of indexed pages are ignored / 停用词阈值
    pub stop_lemma_ratio: f64,
    /// Limit used when a request passes 0 / 默认返回条数
    pub default_limit: usize,
    /// Snippet length in characters / 摘要长度
    pub snippet_length: usize,
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
            db_file: "sitesearch.db".to_string(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            sites: vec![
                SiteConfig {
                    name: "PlayBack.Ru".to_string(),
                    url: "https://www.playback.ru".to_string(),
                },
                SiteConfig {
                    name: "VolochekLife".to_string(),
                    url: "https://volochek.life".to_string(),
                },
            ],
            user_agent: "SiteSearchBot/0.1 (+https://github.com/sitesearch)".to_string(),
            referrer: "https://www.google.com".to_string(),
            min_delay_ms: 500,
            max_delay_ms: 5000,
            request_timeout_secs: 10,
            max_pages: 5000,
            max_concurrent_fetches: num_cpus::get() * 4,
            pipeline_workers: 4,
            rank_weighting: RankWeighting::Constant,
            constant_rank: 0.8,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            stop_lemma_ratio: 0.9,
            default_limit: 20,
            snippet_length: 240,
        }
    }
}

impl AppConfig {
    /// Get the full database URL / 获取完整的数据库URL
    pub fn get_database_url(&self) -> String {
        let db_path = Path::new(&self.database.data_dir).join(&self.database.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
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

impl IndexingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay bounds with min <= max enforced / 保证 min <= max
    pub fn delay_range_ms(&self) -> (u64, u64) {
        if self.min_delay_ms <= self.max_delay_ms {
            (self.min_delay_ms, self.max_delay_ms)
        } else {
            (self.max_delay_ms, self.min_delay_ms)
        }
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from the working directory / 从工作目录加载配置
pub fn load_config() -> Result<AppConfig, String> {
    load_config_from(&get_config_path())
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        let config = AppConfig::default();
        save_config_to(&config, config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}
