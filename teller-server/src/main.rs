use clap::Parser;
use std::sync::Arc;
use teller_core::{CannedResponder, ResponseGenerator, TellerConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use teller_server::server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "teller.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match TellerConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match teller_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match teller_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Teller DB health check passed");
        return Ok(());
    }

    // Idempotent schema setup
    if let Err(e) = teller_core::db::ensure_schema(&pool).await {
        eprintln!("Failed to ensure schema: {}", e);
        std::process::exit(1);
    }

    let responder: Arc<dyn ResponseGenerator> = Arc::new(CannedResponder);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Background sweep loop: promotes queued sessions, abandons idle ones
    let sweep_pool = pool.clone();
    let sweep_chat = config.chat.clone();
    let sweep_responder = responder.clone();
    let sweep_shutdown = tx.subscribe();
    tokio::spawn(async move {
        teller_server::subsystems::sweeper::run_sweep_loop(
            sweep_pool,
            sweep_chat,
            sweep_responder,
            sweep_shutdown,
        )
        .await;
    });

    // HTTP REST API server, if enabled
    if config.http.enabled {
        let http_pool = pool.clone();
        let http_config = config.clone();
        let http_responder = responder.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = teller_server::http::start_http_server(
                http_pool,
                http_config,
                http_responder,
                http_shutdown,
            )
            .await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, pool, config, responder, tx.subscribe()).await?;

    Ok(())
}
