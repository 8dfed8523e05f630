use axum::{Router, extract::Extension, routing::get};
use clap::Parser;
use daily_posts::aggregate::handlers::handle_aggregate;
use daily_posts::config::EngineConfig;
use daily_posts::engine::Engine;
use daily_posts::posts::handlers::{handle_post, handle_posts, handle_stats, handle_tags};
use daily_posts::storage::memory::MemoryStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "daily-posts", about = "Serves daily news post collections over HTTP")]
struct Args {
    /// Address the HTTP server listens on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Directory of `<collection>.json` files to load at startup.
    #[arg(long, env = "NEWS_DATA_DIR")]
    data: Option<PathBuf>,

    /// JSON engine config. Falls back to `NEWS_*` environment variables.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::from_env());
    };
    let raw = std::fs::read_to_string(path)?;
    let config = serde_json::from_str(&raw)?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    // 1. Storage:
    let store = match &args.data {
        Some(dir) => MemoryStore::load_dir(dir)?,
        None => {
            tracing::warn!("No --data directory given, starting with an empty store");
            MemoryStore::new()
        }
    };
    tracing::info!(
        "Store holds {} documents in {} collections",
        store.document_count(),
        store.collection_count()
    );

    // 2. Engine:
    let engine = Arc::new(Engine::new(Arc::new(store), config));

    // 3. HTTP Router:
    let app = Router::new()
        .route("/posts", get(handle_posts))
        .route("/post/:id", get(handle_post))
        .route("/tags", get(handle_tags))
        .route("/aggregate", get(handle_aggregate))
        .route("/stats", get(handle_stats))
        .layer(Extension(engine));

    // 4. Start HTTP server:
    tracing::info!("HTTP server listening on {}", args.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
