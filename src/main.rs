use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use sitesearch::config;
use sitesearch::crawler::HttpFetcher;
use sitesearch::lemmatizer::{Lemmatizer, SnowballLemmatizer};
use sitesearch::store::IndexStore;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sitesearch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config().map_err(anyhow::Error::msg)?;
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);
    tracing::info!("{} seed sites configured", app_config.indexing.sites.len());

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| app_config.get_database_url());

    let store = IndexStore::connect(&database_url, 8).await?;
    store.migrate().await?;

    // Sites left INDEXING by a previous process never finished / 启动时标记中断的站点
    let interrupted = store
        .fail_interrupted_sites("Indexing interrupted by server restart")
        .await?;
    if interrupted > 0 {
        tracing::warn!("Marked {} interrupted sites as FAILED", interrupted);
    }

    let fetcher = Arc::new(HttpFetcher::new(&app_config.indexing)?);
    let lemmatizer: Arc<dyn Lemmatizer> = Arc::new(SnowballLemmatizer::new());
    let state = Arc::new(AppState::new(store, &app_config, fetcher, lemmatizer));

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
