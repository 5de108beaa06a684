use std::sync::Arc;

use clap::Parser;
use helpdesk_core::{
    ChatCompletionClient, CompletionBackend, ContextWindow, DocumentSet, HelpdeskConfig, Store,
    TurnOrchestrator,
};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use helpdesk_server::server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "helpdesk.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (production sets real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match HelpdeskConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Open the store
    let store = match Store::connect(&config.database).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match store.health_check().await {
            Ok(v) => println!("✅ SQLite connected: {}", v),
            Err(e) => {
                println!("❌ SQLite connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match DocumentSet::load(&config.docs.path) {
            Ok(docs) => println!("✅ Documentation loaded: {} documents", docs.len()),
            Err(e) => {
                println!("❌ Documentation failed to load: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Helpdesk health check passed");
        return Ok(());
    }

    // Documentation corpus is read once and shared read-only for the process lifetime
    let docs = match DocumentSet::load(&config.docs.path) {
        Ok(d) => Arc::new(d),
        Err(e) => {
            eprintln!("Failed to load documentation from {}: {}", config.docs.path, e);
            std::process::exit(1);
        }
    };

    let backend: Arc<dyn CompletionBackend> = match ChatCompletionClient::from_config(&config.completion) {
        Ok(client) => {
            tracing::info!(model = client.model(), "Completion client ready");
            Arc::new(client)
        }
        Err(e) => {
            eprintln!("Failed to create completion client: {}", e);
            std::process::exit(1);
        }
    };

    let turns = TurnOrchestrator::new(
        store,
        backend,
        docs,
        ContextWindow::new(config.context.window_size),
    );

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Spawn HTTP REST API server if enabled
    if config.http.enabled {
        let http_turns = turns.clone();
        let http_config = config.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) =
                helpdesk_server::http::start_http_server(http_turns, http_config, http_shutdown).await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, turns, tx.subscribe()).await?;

    Ok(())
}
