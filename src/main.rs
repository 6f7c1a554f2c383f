use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use research_news::aggregator::Aggregator;
use research_news::config::{Config, FeedRegistry};
use research_news::fetcher::Fetcher;
use research_news::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "research_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("NEWS_CONFIG").unwrap_or_else(|_| "news.toml".to_string());
    let config = match Config::load_optional(&config_path)? {
        Some(config) => {
            info!("Loaded configuration from {}", config_path);
            config
        }
        None => {
            info!("No configuration at {}, using defaults", config_path);
            Config::default()
        }
    };

    let registry = FeedRegistry::research();
    info!("Serving news from {} feeds", registry.len());

    let fetcher = Fetcher::new(Duration::from_secs(config.fetch_timeout_secs))?;
    let aggregator =
        Aggregator::new(registry, fetcher).with_limits(config.default_limit, config.max_limit);

    let state = Arc::new(AppState { aggregator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Build router
    let mut app = routes::router(state);
    if let Some(dir) = &config.static_dir {
        info!("Serving frontend from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))));
    }
    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    // Start server
    let port = std::env::var("PORT").ok();
    let addr = config.listen_addr(port.as_deref());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
