use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use site_search::config;
use site_search::crawler::{CrawlSettings, HttpFetcher};
use site_search::db;
use site_search::indexer::{IndexMaintainer, IndexingService};
use site_search::morphology::RussianMorphology;
use site_search::repository::Repository;
use site_search::search::{LemmaExtractor, SearchEngine, SnippetSelector};
use state::AppState;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "site_search=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("site-search {} (built {})", env!("CARGO_PKG_VERSION"), env!("BUILD_TIME"));

    // Load configuration
    let app_config = config::load_config().map_err(anyhow::Error::msg)?;
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);

    // Create data directory if not exists
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| app_config.get_database_url());

    let pool = db::connect(&database_url).await?;
    db::run_migrations(&pool).await?;

    let repo = Repository::new(pool);

    // Sites left INDEXING by a previous process can never finish
    let interrupted = repo
        .fail_indexing_sites("Indexing interrupted by server restart")
        .await?;
    if interrupted > 0 {
        tracing::warn!("Marked {} interrupted sites as FAILED", interrupted);
    }

    let dictionary = &app_config.morphology.dictionary_path;
    let morphology = if std::path::Path::new(dictionary).exists() {
        let path = dictionary.clone();
        tokio::task::spawn_blocking(move || RussianMorphology::load(path)).await??
    } else {
        tracing::warn!(
            "Morphology dictionary {} not found, unknown words are reduced to stems",
            dictionary
        );
        RussianMorphology::new()
    };
    let extractor = LemmaExtractor::new(Arc::new(morphology));
    let maintainer = Arc::new(IndexMaintainer::new(repo.clone(), extractor.clone()));
    let fetcher = Arc::new(HttpFetcher::new(&app_config.crawler)?);

    let indexing = IndexingService::new(
        repo.clone(),
        maintainer,
        fetcher,
        app_config.sites.clone(),
        CrawlSettings::from(&app_config.crawler),
    );
    let snippets = SnippetSelector::new(extractor.clone(), app_config.search.snippet_context_words);
    let search = SearchEngine::new(repo.clone(), extractor, snippets, app_config.search.default_limit);

    let state = Arc::new(AppState {
        repo,
        indexing,
        search,
    });

    let app = Router::new()
        .route("/api/startIndexing", get(api::indexing::start_indexing))
        .route("/api/stopIndexing", get(api::indexing::stop_indexing))
        .route("/api/indexPage", post(api::indexing::index_page))
        .route("/api/search", get(api::search::search))
        .route("/api/statistics", get(api::stats::get_statistics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if state.indexing.is_indexing().await {
        if let Err(e) = state.indexing.stop_indexing().await {
            tracing::warn!("Stopping indexing on shutdown: {}", e);
        }
    }
    state.indexing.wait_idle().await;

    Ok(())
}
