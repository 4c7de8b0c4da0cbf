use std::sync::Arc;

use tracing::{error, info};

use pinboard::config::LoggingConfig;
use pinboard::{
    BoardContext, Cache, CacheCoordinator, Config, Database, DisabledCache, Hub, MemoryCache,
    WebServer,
};

#[tokio::main]
async fn main() {
    // Load configuration
    let mut config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = pinboard::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        let console = LoggingConfig {
            file: String::new(),
            ..config.logging.clone()
        };
        let _ = pinboard::logging::init(&console);
    }

    if let Err(e) = run(config).await {
        error!("pinboard stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> pinboard::Result<()> {
    config.validate()?;

    info!("pinboard - collaborative board backend");

    let db = Arc::new(Database::open(&config.database.path, config.database.max_connections).await?);
    info!("Database ready");

    let cache: Arc<dyn Cache> = if config.cache.enabled {
        Arc::new(MemoryCache::new())
    } else {
        info!("Board snapshot cache disabled");
        Arc::new(DisabledCache)
    };
    let cache = Arc::new(CacheCoordinator::with_ttl(cache, config.cache.ttl()));

    let hub = Hub::spawn(&config.hub);
    let ctx = BoardContext::new(db, cache, hub);

    WebServer::new(&config.server, ctx)?.run().await
}
